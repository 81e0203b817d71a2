//! Device hostname from a captured CLI prompt.

/// Hostname from the first line that looks like `host#...` or `host>...`.
///
/// A parenthesised mode suffix (`edge-1(config-if-Po1)#`) is dropped.
/// Returns `None` when no line carries a prompt.
pub fn find_hostname(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let end = line.find(['#', '>'])?;
        let head = line[..end].trim_start();
        let head = match head.find('(') {
            Some(open) if head.ends_with(')') => &head[..open],
            _ => head,
        };
        if head.is_empty() || head.contains(char::is_whitespace) {
            return None;
        }
        Some(head.to_string())
    })
}
