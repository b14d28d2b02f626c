//! Configuration text helpers.

/// Expand `${VAR}` patterns in a string with environment variable values.
///
/// Unknown variables are replaced with an empty string. An unterminated
/// `${` swallows the rest of the input.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                if let Ok(value) = std::env::var(&tail[..end]) {
                    out.push_str(&value);
                }
                rest = &tail[end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
