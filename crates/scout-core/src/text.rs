/// Cut `input` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &input[..idx]),
        None => input.to_string(),
    }
}

/// Single-line preview for log fields.
pub fn preview(input: &str, max_chars: usize) -> String {
    let flattened = input.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&flattened, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_untouched() {
        assert_eq!(truncate_chars("Paris", 10), "Paris");
        assert_eq!(truncate_chars("Paris", 5), "Paris");
    }

    #[test]
    fn long_input_is_cut_on_char_boundary() {
        assert_eq!(truncate_chars("Zürich is big", 3), "Zür...");
    }

    #[test]
    fn preview_flattens_whitespace() {
        assert_eq!(preview("line one\n\n  line two", 100), "line one line two");
    }
}
