//! Small helpers shared across modules.

/// Copy `s` into a fixed-capacity string, truncating on a char boundary
/// when it does not fit.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
