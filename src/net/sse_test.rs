use super::*;

#[test]
fn single_event() {
    let mut decoder = SseDecoder::new();
    assert_eq!(decoder.push(b"data: Hello\n\n"), vec!["Hello".to_string()]);
}

#[test]
fn event_split_across_chunks() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"da").is_empty());
    assert!(decoder.push(b"ta: Hel").is_empty());
    assert!(decoder.push(b"lo\r\n").is_empty());
    assert_eq!(decoder.push(b"\r\n"), vec!["Hello".to_string()]);
}

#[test]
fn multiple_data_lines_join_with_newline() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"data: first\ndata: second\n\n");
    assert_eq!(events, vec!["first\nsecond".to_string()]);
}

#[test]
fn only_one_leading_space_is_stripped() {
    let mut decoder = SseDecoder::new();
    assert_eq!(decoder.push(b"data:  world\n\ndata:x\n\n"), vec![" world".to_string(), "x".to_string()]);
}

#[test]
fn comments_and_other_fields_are_ignored() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b": keep-alive\nevent: chunk\nid: 3\ndata: body\n\n\n");
    assert_eq!(events, vec!["body".to_string()]);
}

#[test]
fn blank_line_without_data_dispatches_nothing() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"\n\n: ping\n\n").is_empty());
}

#[test]
fn finish_flushes_pending_event() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"data: tail\n").is_empty());
    assert_eq!(decoder.finish(), Some("tail".to_string()));
    assert_eq!(decoder.finish(), None);
}

#[test]
fn finish_flushes_unterminated_line() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"data: [DONE]").is_empty());
    assert_eq!(decoder.finish(), Some("[DONE]".to_string()));
}
