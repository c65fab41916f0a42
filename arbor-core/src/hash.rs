/// Structural hash of a node name.
///
/// Polynomial hash (base 31) over the UTF-16 code units of `name`, computed with
/// 32-bit wrapping arithmetic and widened to `i64`. The value only narrows
/// lookups: distinct names can and do collide (`"Aa"` and `"BB"` for example),
/// so callers always compare the stored name afterwards.
pub fn name_hash(name: &str) -> i64 {
    name.encode_utf16()
        .fold(0i32, |acc, unit| {
            acc.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .into()
}
