//! POSIX shell quoting for command strings handed to the executor.

/// Quotes a single argument. Arguments made only of safe characters are
/// returned unchanged.
pub fn quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quotes a glob pattern while leaving its `*` wildcards active.
pub fn quote_glob(pattern: &str) -> String {
    pattern
        .split('*')
        .map(|part| if part.is_empty() { String::new() } else { quote(part) })
        .collect::<Vec<_>>()
        .join("*")
}

/// Quotes each argument and joins them with spaces.
pub fn join<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '_' | '-' | '.' | '/' | ':' | '=' | ',' | '+' | '@' | '%'
        )
}
