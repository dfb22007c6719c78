/// Replace `${ENV_VAR}` placeholders in config text.
///
/// Unresolvable or malformed placeholders are left as-is so errors surface in
/// the parsed value instead of silently becoming empty strings.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Implementation seam: placeholder substitution with an injected lookup, so
/// tests don't have to mutate the process environment.
fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // No closing brace (or empty name): emit literally and move on.
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}
