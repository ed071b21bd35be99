//! Stable storage/display keys derived from a group and a name.

/// Converts a group and a name to a unique key of the form `group_name`.
///
/// Both parts are sanitized so that the key is safe to use in URLs and as a
/// database lookup value. An empty group yields a key with a leading
/// underscore (`_name`), which keeps ungrouped entries distinguishable from
/// grouped ones.
///
/// ```
/// use upwatch_common::key::convert_group_and_name_to_key;
///
/// assert_eq!(convert_group_and_name_to_key("Core", "Front End"), "core_front-end");
/// assert_eq!(convert_group_and_name_to_key("", "name"), "_name");
/// ```
pub fn convert_group_and_name_to_key(group: &str, name: &str) -> String {
    format!("{}_{}", sanitize(group), sanitize(name))
}

fn sanitize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '_' | ',' | '.' | '#' | ' ' | '&' | '+' => '-',
            other => other,
        })
        .collect()
}
