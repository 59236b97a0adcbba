use parley_llm::{Content, ContentPart, Message};

#[test]
fn test_content_text_creation() {
    let content = Content::text("Hello, world!");
    assert_eq!(content.as_text(), Some("Hello, world!"));
}

#[test]
fn test_content_from_string() {
    let content: Content = "Test".into();
    assert_eq!(content.as_text(), Some("Test"));
}

#[test]
fn test_content_parts_with_image_are_not_plain_text() {
    let content = Content::Parts(vec![
        ContentPart::text("look"),
        ContentPart::image_url("data:image/png;base64,AAAA"),
    ]);
    assert_eq!(content.as_text(), None);
    assert_eq!(content.image_count(), 1);
}

#[test]
fn test_single_text_part_reads_as_text() {
    let content = Content::Parts(vec![ContentPart::text("only")]);
    assert_eq!(content.as_text(), Some("only"));
}

#[test]
fn test_message_roles() {
    assert_eq!(Message::system("You are helpful").role(), "system");
    assert_eq!(Message::human("Hello").role(), "user");
    assert_eq!(Message::ai("Hi there!").role(), "assistant");
}

#[test]
fn test_message_serialization_human() {
    let msg = Message::human("Hello");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("Hello"));
}

#[test]
fn test_message_deserialization() {
    let json = r#"{"role":"assistant","content":"Test"}"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.role(), "assistant");
    assert_eq!(msg.content().as_text(), Some("Test"));
}
