//! The built-in sample program run by `quill sample`.

use quill_types::SourceMap;

pub const SAMPLE_ID: &str = "HelloQuill.ql";

/// Counts heads over a hundred coin flips and reports both totals.
pub const SAMPLE_SOURCE: &str = r#"
namespace HelloQuill {
    open Quill.Intrinsic;

    @EntryPoint()
    operation HelloQ() : Int {
        let ones = CountOnes(100);
        Message("Ones: " + IntAsString(ones));
        Message("Zeros: " + IntAsString(100 - ones));
        return ones;
    }

    operation CountOnes(count : Int) : Int {
        mutable total = 0;
        for idx in 1..count {
            set total += RandomInt(2) == 1 ? 1 | 0;
        }
        return total;
    }
}
"#;

pub fn sample_sources() -> SourceMap {
    let mut sources = SourceMap::new();
    sources.insert(SAMPLE_ID.to_string(), SAMPLE_SOURCE.to_string());
    sources
}
