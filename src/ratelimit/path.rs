//! Endpoint path normalization.
//!
//! Paths that embed resource IDs are collapsed into a template so that
//! `/tasks/42` and `/tasks/43` share one endpoint limiter.

/// Placeholder substituted for every ID-like path component.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Length of a canonical `8-4-4-4-12` UUID.
const UUID_LEN: usize = 36;
const UUID_HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Collapse UUIDs and purely numeric segments in `path` into [`ID_PLACEHOLDER`].
///
/// UUIDs are replaced first (anywhere in the path, case-insensitive), then
/// every segment made only of ASCII digits.
pub fn normalize(path: &str) -> String {
    let without_uuids = replace_uuids(path);
    replace_numeric_segments(&without_uuids)
}

fn replace_uuids(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut copied = 0;
    let mut i = 0;

    while i + UUID_LEN <= bytes.len() {
        if is_uuid(&bytes[i..i + UUID_LEN]) {
            // Matches are pure ASCII, so both ends sit on char boundaries.
            out.push_str(&path[copied..i]);
            out.push_str(ID_PLACEHOLDER);
            i += UUID_LEN;
            copied = i;
        } else {
            i += 1;
        }
    }

    out.push_str(&path[copied..]);
    out
}

fn is_uuid(candidate: &[u8]) -> bool {
    candidate.iter().enumerate().all(|(idx, b)| {
        if UUID_HYPHENS.contains(&idx) {
            *b == b'-'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}

fn replace_numeric_segments(path: &str) -> String {
    let mut segments = path.split('/');
    let mut out = String::with_capacity(path.len());

    // Anything before the first slash is not a path segment.
    if let Some(head) = segments.next() {
        out.push_str(head);
    }

    for segment in segments {
        out.push('/');
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push_str(ID_PLACEHOLDER);
        } else {
            out.push_str(segment);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments() {
        assert_eq!(normalize("/tasks/42/comments/7"), "/tasks/{id}/comments/{id}");
        assert_eq!(normalize("/tasks/42/"), "/tasks/{id}/");
    }

    #[test]
    fn test_uuid_segment() {
        assert_eq!(
            normalize("/tasks/3fa85f64-5717-4562-b3fc-2c963f66afa6"),
            "/tasks/{id}"
        );
        assert_eq!(
            normalize("/tasks/3FA85F64-5717-4562-B3FC-2C963F66AFA6/tags"),
            "/tasks/{id}/tags"
        );
    }

    #[test]
    fn test_random_uuids_share_template() {
        let a = normalize(&format!("/projects/{}/tasks/1", uuid::Uuid::new_v4()));
        let b = normalize(&format!("/projects/{}/tasks/2", uuid::Uuid::new_v4()));
        assert_eq!(a, "/projects/{id}/tasks/{id}");
        assert_eq!(a, b);
    }

    #[test]
    fn test_uuid_inside_segment() {
        assert_eq!(
            normalize("/files/doc-3fa85f64-5717-4562-b3fc-2c963f66afa6.pdf"),
            "/files/doc-{id}.pdf"
        );
    }

    #[test]
    fn test_uuid_with_numeric_groups_is_one_id() {
        // Every group is digits-only; UUID replacement must win
        assert_eq!(
            normalize("/tasks/12345678-1234-1234-1234-123456789012"),
            "/tasks/{id}"
        );
    }

    #[test]
    fn test_mixed_segments_untouched() {
        assert_eq!(normalize("/api/v2/tasks"), "/api/v2/tasks");
        assert_eq!(normalize("/tasks/123abc"), "/tasks/123abc");
        assert_eq!(normalize("/tasks/3fa85f64-5717"), "/tasks/3fa85f64-5717");
    }

    #[test]
    fn test_static_paths_unchanged() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/health"), "/health");
        assert_eq!(normalize("/mcp/sse"), "/mcp/sse");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("/tasks/42/comments/3fa85f64-5717-4562-b3fc-2c963f66afa6");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_non_ascii_path() {
        assert_eq!(normalize("/tâches/42"), "/tâches/{id}");
    }
}
