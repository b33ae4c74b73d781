//! Markdown size rules for documentation writes.

/// Count lines outside fenced code blocks. Fence lines themselves are excluded.
pub fn count_prose_lines(content: &str) -> usize {
    let mut in_fence = false;
    let mut count = 0;
    for line in content.split('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            count += 1;
        }
    }
    count
}

/// `*GUIDE.md` files are not allowed at all.
pub fn is_guide_file(path: &str) -> bool {
    path.to_ascii_uppercase().contains("GUIDE.MD")
}

pub fn is_markdown(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_blocks_are_excluded() {
        let doc = "# Title\ntext\n```mermaid\ngraph TD\nA-->B\n```\nmore";
        assert_eq!(count_prose_lines(doc), 3);
    }

    #[test]
    fn unterminated_fence_hides_the_rest() {
        assert_eq!(count_prose_lines("a\n```\nb\nc"), 1);
    }

    #[test]
    fn guide_detection_is_case_insensitive() {
        assert!(is_guide_file("docs/SETUP-GUIDE.md"));
        assert!(is_guide_file("docs/guide.md"));
        assert!(!is_guide_file("docs/guidelines.txt"));
        assert!(is_markdown("README.MD"));
    }
}
