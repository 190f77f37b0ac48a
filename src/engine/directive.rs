/// Marker of a setter directive, e.g. `# kpt-set: ${image}:${tag}`.
pub const SETTER_MARKER: &str = "# kpt-set: ";
/// Marker of an apply-time mutation directive.
pub const MUTATION_MARKER: &str = "# apply-time-mutation: ";

/// Payload of a directive comment, trimmed.
///
/// Spacing around the `#` and after the colon is not significant, so
/// `#kpt-set:${a}` and `# kpt-set: ${a}` carry the same payload. An empty
/// payload is no directive.
pub fn extract<'a>(comment: Option<&'a str>, marker: &str) -> Option<&'a str> {
    let body = comment?.trim().strip_prefix('#')?.trim_start();
    let keyword = marker.trim().trim_start_matches('#').trim_start();
    let payload = body.strip_prefix(keyword)?.trim();
    (!payload.is_empty()).then_some(payload)
}

/// Comment text carrying `payload` under `marker`.
pub fn format(marker: &str, payload: &str) -> String {
    format!("{marker}{payload}")
}
