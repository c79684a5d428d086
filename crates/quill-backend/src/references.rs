//! The reference catalogue: WAT preludes linked into every module that
//! names them.
//!
//! A reference contributes two parts: imports, which must precede every
//! definition in the assembled module, and definitions.
//!
//! Prelude layout (below [`STRING_POOL_BASE`](quill_types::abi::STRING_POOL_BASE)):
//!
//! | Offset | Contents |
//! |--------|----------|
//! | 8      | `"true"` |
//! | 24     | `"false"` |

/// Linear memory, allocator and string helpers.
pub const RUNTIME_REFERENCE: &str = "Quill.Runtime.qlib";
/// Host imports and the `Quill.Intrinsic` callables.
pub const INTRINSIC_REFERENCE: &str = "Quill.Intrinsic.qlib";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendReference {
    pub name: &'static str,
    /// References this one calls into; linked automatically.
    pub requires: &'static [&'static str],
    pub imports: &'static str,
    pub definitions: &'static str,
}

const CATALOGUE: &[BackendReference] = &[
    BackendReference {
        name: RUNTIME_REFERENCE,
        requires: &[],
        imports: "",
        definitions: RUNTIME_DEFINITIONS,
    },
    BackendReference {
        name: INTRINSIC_REFERENCE,
        requires: &[RUNTIME_REFERENCE],
        imports: INTRINSIC_IMPORTS,
        definitions: INTRINSIC_DEFINITIONS,
    },
];

/// Case-insensitive lookup.
pub fn lookup(name: &str) -> Option<&'static BackendReference> {
    CATALOGUE.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

pub fn known() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|r| r.name)
}

// ══════════════════════════════════════════════════════════════════════════════
// Quill.Runtime
// ══════════════════════════════════════════════════════════════════════════════

const RUNTIME_DEFINITIONS: &str = r#"
(memory $Quill.Runtime.Memory (export "memory") 2)
(global $Quill.Runtime.HeapTop (mut i32) (i32.const 65536))
(data (i32.const 8) "\04\00\00\00true")
(data (i32.const 24) "\05\00\00\00false")

;; Bump allocator: 4-byte aligned, grows memory on demand, never frees.
(func $Quill.Runtime.Alloc (param $size i32) (result i32)
  (local $ptr i32)
  (local $end i32)
  (local $limit i32)
  global.get $Quill.Runtime.HeapTop
  local.set $ptr
  local.get $ptr
  local.get $size
  i32.add
  i32.const 3
  i32.add
  i32.const -4
  i32.and
  local.set $end
  memory.size
  i32.const 16
  i32.shl
  local.set $limit
  block $fits
    local.get $end
    local.get $limit
    i32.le_u
    br_if $fits
    local.get $end
    local.get $limit
    i32.sub
    i32.const 65535
    i32.add
    i32.const 16
    i32.shr_u
    memory.grow
    i32.const -1
    i32.ne
    br_if $fits
    unreachable
  end
  local.get $end
  global.set $Quill.Runtime.HeapTop
  local.get $ptr)

(func $Quill.Runtime.Concat (param $a i32) (param $b i32) (result i32)
  (local $la i32)
  (local $lb i32)
  (local $r i32)
  local.get $a
  i32.load
  local.set $la
  local.get $b
  i32.load
  local.set $lb
  local.get $la
  local.get $lb
  i32.add
  i32.const 4
  i32.add
  call $Quill.Runtime.Alloc
  local.set $r
  local.get $r
  local.get $la
  local.get $lb
  i32.add
  i32.store
  local.get $r
  i32.const 4
  i32.add
  local.get $a
  i32.const 4
  i32.add
  local.get $la
  memory.copy
  local.get $r
  i32.const 4
  i32.add
  local.get $la
  i32.add
  local.get $b
  i32.const 4
  i32.add
  local.get $lb
  memory.copy
  local.get $r)

(func $Quill.Runtime.StrEq (param $a i32) (param $b i32) (result i32)
  (local $len i32)
  (local $i i32)
  local.get $a
  local.get $b
  i32.eq
  if
    i32.const 1
    return
  end
  local.get $a
  i32.load
  local.set $len
  local.get $len
  local.get $b
  i32.load
  i32.ne
  if
    i32.const 0
    return
  end
  block $done
    loop $next
      local.get $i
      local.get $len
      i32.ge_u
      br_if $done
      local.get $a
      local.get $i
      i32.add
      i32.load8_u offset=4
      local.get $b
      local.get $i
      i32.add
      i32.load8_u offset=4
      i32.ne
      if
        i32.const 0
        return
      end
      local.get $i
      i32.const 1
      i32.add
      local.set $i
      br $next
    end
  end
  i32.const 1)
"#;

// ══════════════════════════════════════════════════════════════════════════════
// Quill.Intrinsic
// ══════════════════════════════════════════════════════════════════════════════

const INTRINSIC_IMPORTS: &str = r#"
(import "quill.intrinsic" "message" (func $Quill.Intrinsic.Message (param i32)))
(import "quill.intrinsic" "random_int" (func $Quill.Intrinsic.RandomInt (param i64) (result i64)))
(import "quill.intrinsic" "fail" (func $Quill.Intrinsic.Fail (param i32)))
(import "quill.intrinsic" "exit" (func $Quill.Intrinsic.Exit (param i32)))
"#;

const INTRINSIC_DEFINITIONS: &str = r#"
(func $Quill.Intrinsic.Length (param $s i32) (result i64)
  local.get $s
  i32.load
  i64.extend_i32_u)

(func $Quill.Intrinsic.BoolAsString (param $b i32) (result i32)
  local.get $b
  if (result i32)
    i32.const 8
  else
    i32.const 24
  end)

;; Decimal digits are written backwards into a scratch buffer, then copied
;; into a fresh string.
(func $Quill.Intrinsic.IntAsString (param $value i64) (result i32)
  (local $buf i32)
  (local $pos i32)
  (local $neg i32)
  (local $mag i64)
  (local $len i32)
  (local $out i32)
  i32.const 24
  call $Quill.Runtime.Alloc
  local.set $buf
  local.get $buf
  i32.const 24
  i32.add
  local.set $pos
  local.get $value
  i64.const 0
  i64.lt_s
  local.set $neg
  local.get $neg
  if (result i64)
    i64.const 0
    local.get $value
    i64.sub
  else
    local.get $value
  end
  local.set $mag
  loop $digit
    local.get $pos
    i32.const 1
    i32.sub
    local.set $pos
    local.get $pos
    local.get $mag
    i64.const 10
    i64.rem_u
    i32.wrap_i64
    i32.const 48
    i32.add
    i32.store8
    local.get $mag
    i64.const 10
    i64.div_u
    local.set $mag
    local.get $mag
    i64.const 0
    i64.ne
    br_if $digit
  end
  local.get $neg
  if
    local.get $pos
    i32.const 1
    i32.sub
    local.set $pos
    local.get $pos
    i32.const 45
    i32.store8
  end
  local.get $buf
  i32.const 24
  i32.add
  local.get $pos
  i32.sub
  local.set $len
  local.get $len
  i32.const 4
  i32.add
  call $Quill.Runtime.Alloc
  local.set $out
  local.get $out
  local.get $len
  i32.store
  local.get $out
  i32.const 4
  i32.add
  local.get $pos
  local.get $len
  memory.copy
  local.get $out)
"#;
