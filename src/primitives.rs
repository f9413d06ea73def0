use crate::evaluator::{EvalError, EvalResult};
use crate::source::Location;
use crate::value::{List, Value, ValueRef};

// Machine integer arithmetic: overflow wraps, division truncates toward zero
// and the remainder takes the dividend's sign. `None` means division by zero.

pub fn add(left: i64, right: i64) -> Option<i64> {
    Some(left.wrapping_add(right))
}

pub fn sub(left: i64, right: i64) -> Option<i64> {
    Some(left.wrapping_sub(right))
}

pub fn mul(left: i64, right: i64) -> Option<i64> {
    Some(left.wrapping_mul(right))
}

pub fn div(left: i64, right: i64) -> Option<i64> {
    (right != 0).then(|| left.wrapping_div(right))
}

pub fn rem(left: i64, right: i64) -> Option<i64> {
    (right != 0).then(|| left.wrapping_rem(right))
}

fn to_index(index: i64, len: usize, at: Location) -> EvalResult<usize> {
    usize::try_from(index).map_err(|_| EvalError::IndexOutOfRange { index, len, at })
}

/// The slot holding element `index`, shared with `list`.
pub fn index(list: &List, index: i64, at: Location) -> EvalResult<ValueRef> {
    let len = list.len();
    let position = to_index(index, len, at)?;
    list.slot(position)
        .ok_or(EvalError::IndexOutOfRange { index, len, at })
}

/// Elements `start..end` of `list`, or `start..` when `end` is zero. The
/// result shares its element slots with `list`.
pub fn range(list: &List, start: i64, end: i64, at: Location) -> EvalResult<List> {
    let len = list.len();
    let from = to_index(start, len, at)?;
    let to = if end == 0 { len } else { to_index(end, len, at)? };
    list.slice(from, to).ok_or_else(|| {
        let index = if from > len || from > to { start } else { end };
        EvalError::IndexOutOfRange { index, len, at }
    })
}

/// Maps a number to the character with that code point, substituting U+FFFD
/// for anything that is not a Unicode scalar value.
pub fn code_point_char(code: i64) -> char {
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Decodes a list of character codes, as written by `print`.
pub fn decode_chars(list: &List, at: Location) -> EvalResult<String> {
    list.iter()
        .map(|slot| match slot.get() {
            Value::Number(code) => Ok(code_point_char(code)),
            other => Err(EvalError::TypeMismatch {
                operator: "print",
                expected: "number",
                found: other.type_name(),
                at,
            }),
        })
        .collect()
}

/// Renders a value the way `echo` writes it, without the trailing newline.
pub fn render(value: &Value, at: Location, out: &mut String) {
    match value {
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::List(list) => {
            out.push_str("[ list ");
            for slot in list.iter() {
                render(&slot.get(), at, out);
                out.push(' ');
            }
            out.push_str("] ");
        }
        Value::Function(function) => {
            out.push_str(&format!("Unprintable Value: {} {}", function, at));
        }
    }
}
