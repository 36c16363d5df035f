use super::*;
use crate::{telegram::Update, test_support::{FakeOutbound, Sent}};
use navigator::{AccessPolicy, NavigatorSettings};
use shared::{domain::NodeId, protocol::TextFormat};
use storage::Storage;

const ADMIN: i64 = 900;
const VISITOR: i64 = 100;

async fn navigator() -> Navigator<Storage> {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    Navigator::new(
        storage,
        AccessPolicy::new([UserId(ADMIN)]),
        NavigatorSettings::default(),
    )
}

fn message_update(user: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "from": { "id": user },
            "chat": { "id": user },
            "text": text,
        }
    }))
    .expect("update")
}

fn callback_update(user: i64, data: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb-1",
            "from": { "id": user },
            "message": { "message_id": 33, "chat": { "id": user } },
            "data": data,
        }
    }))
    .expect("update")
}

#[test]
fn caption_and_document_become_edit_body_and_media() {
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 3,
        "message": {
            "message_id": 4,
            "from": { "id": 7 },
            "chat": { "id": -100 },
            "text": "ignored",
            "caption": "Q|A",
            "document": { "file_id": "BQACAgIAAxkBAAIC" },
            "photo": [{ "file_id": "photo-small" }]
        }
    }))
    .expect("update");

    let incoming = normalize(&update).expect("incoming");
    assert_eq!(incoming.event.user_id, UserId(7));
    assert_eq!(incoming.event.chat_id, ChatId(-100));
    assert_eq!(
        incoming.event.kind,
        EventKind::Message {
            text: "Q|A".into(),
            media: Some(Media {
                kind: MediaKind::Document,
                handle: "BQACAgIAAxkBAAIC".into(),
            }),
        }
    );
    assert!(incoming.callback_id.is_none());
}

#[test]
fn first_photo_size_is_used() {
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 3,
        "message": {
            "message_id": 4,
            "from": { "id": 7 },
            "chat": { "id": 7 },
            "photo": [{ "file_id": "small" }, { "file_id": "large" }]
        }
    }))
    .expect("update");

    let incoming = normalize(&update).expect("incoming");
    let EventKind::Message { text, media } = incoming.event.kind else {
        panic!("expected message");
    };
    assert_eq!(text, "");
    assert_eq!(media.map(|m| m.handle).as_deref(), Some("small"));
}

#[test]
fn updates_without_sender_are_skipped() {
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 5,
        "message": { "message_id": 1, "chat": { "id": -1 }, "text": "/start" }
    }))
    .expect("update");
    assert!(normalize(&update).is_none());

    let empty: Update = serde_json::from_value(serde_json::json!({ "update_id": 6 })).expect("update");
    assert!(normalize(&empty).is_none());
}

#[test]
fn callback_keeps_source_message_and_id() {
    let incoming = normalize(&callback_update(VISITOR, "p_3_1")).expect("incoming");
    assert_eq!(incoming.callback_id.as_deref(), Some("cb-1"));
    assert_eq!(incoming.event.message_id, Some(MessageId(33)));
    assert_eq!(
        incoming.event.kind,
        EventKind::Callback {
            data: "p_3_1".into()
        }
    );
}

#[tokio::test]
async fn select_replaces_menu_with_media_then_answer() {
    let nav = navigator().await;
    let id = nav
        .store()
        .create_node("en", "Forms", "See attached", NodeId::ROOT)
        .await
        .expect("node");
    let media = Media {
        kind: MediaKind::Photo,
        handle: "AgACAgIAAxkBAAIB".into(),
    };
    nav.store().update_media(id, &media).await.expect("media");

    let outbound = FakeOutbound::default();
    process_update(&nav, &outbound, callback_update(VISITOR, &format!("q_{id}"))).await;

    let sent = outbound.sent();
    assert_eq!(sent[0], Sent::Delete(ChatId(VISITOR), MessageId(33)));
    assert_eq!(sent[1], Sent::Media(ChatId(VISITOR), media));
    let Sent::Text(_, answer) = &sent[2] else {
        panic!("expected answer text, got {:?}", sent[2]);
    };
    assert_eq!(answer.text, "*Forms*\n\nSee attached");
    assert_eq!(answer.format, TextFormat::Markdown);
    assert_eq!(sent[3], Sent::Ack("cb-1".into()));
}

#[tokio::test]
async fn undeletable_source_still_gets_answer() {
    let nav = navigator().await;
    let id = nav
        .store()
        .create_node("en", "Hours", "9 to 5", NodeId::ROOT)
        .await
        .expect("node");

    let outbound = FakeOutbound::default();
    outbound.fail_deletes();
    process_update(&nav, &outbound, callback_update(VISITOR, &format!("q_{id}"))).await;

    let sent = outbound.sent();
    assert!(matches!(&sent[0], Sent::Text(_, m) if m.text.contains("9 to 5")));
    assert_eq!(sent[1], Sent::Ack("cb-1".into()));
}

#[tokio::test]
async fn rejected_media_still_delivers_answer_text() {
    let outbound = FakeOutbound::default();
    outbound.fail_media();
    let event = InboundEvent {
        user_id: UserId(VISITOR),
        chat_id: ChatId(VISITOR),
        message_id: Some(MessageId(33)),
        kind: EventKind::Callback {
            data: "q_4".into(),
        },
    };
    let answer = Outgoing {
        text: "*Forms*\n\nSee attached".into(),
        format: TextFormat::Markdown,
        media: Some(Media {
            kind: MediaKind::Photo,
            handle: "stale-file-id".into(),
        }),
        keyboard: None,
    };

    apply_render(&outbound, &event, &Render::Replace(answer.clone()))
        .await
        .expect("answer delivered");

    assert_eq!(
        outbound.sent(),
        vec![
            Sent::Delete(ChatId(VISITOR), MessageId(33)),
            Sent::Text(ChatId(VISITOR), answer),
        ]
    );
}

#[tokio::test]
async fn malformed_callback_is_silent_but_acknowledged() {
    let nav = navigator().await;
    let outbound = FakeOutbound::default();
    process_update(&nav, &outbound, callback_update(VISITOR, "p_3")).await;
    assert_eq!(outbound.sent(), vec![Sent::Ack("cb-1".into())]);
}

#[tokio::test]
async fn paging_edits_only_the_menu() {
    let nav = navigator().await;
    for i in 0..7 {
        nav.store()
            .create_node("en", &format!("q{i}"), "a", NodeId::ROOT)
            .await
            .expect("node");
    }

    let outbound = FakeOutbound::default();
    process_update(&nav, &outbound, callback_update(VISITOR, "p_0_1")).await;

    let sent = outbound.sent();
    let Sent::EditMenu(chat, message, menu) = &sent[0] else {
        panic!("expected menu edit, got {:?}", sent[0]);
    };
    assert_eq!((*chat, *message), (ChatId(VISITOR), MessageId(33)));
    assert_eq!(menu.item_ids().len(), 2);
    assert_eq!(menu.page_targets(), vec![0]);
}

#[tokio::test]
async fn admin_add_flow_creates_question() {
    let nav = navigator().await;
    let outbound = FakeOutbound::default();

    process_update(&nav, &outbound, callback_update(ADMIN, "add_question_0")).await;
    process_update(&nav, &outbound, message_update(ADMIN, "Where?|Here")).await;

    let texts: Vec<_> = outbound
        .sent()
        .into_iter()
        .filter_map(|s| match s {
            Sent::Text(_, m) => Some(m.text),
            _ => None,
        })
        .collect();
    assert!(texts[0].starts_with("Send your new question for language [en] and parent [0]"));
    assert_eq!(texts[1], "Question created successfully.");

    let nodes = nav.store().questions_by_language("en").await.expect("list");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].text, "Where?");
}

#[tokio::test]
async fn visitor_admin_tokens_do_nothing_visible() {
    let nav = navigator().await;
    let outbound = FakeOutbound::default();
    process_update(&nav, &outbound, callback_update(VISITOR, "add_question_0")).await;
    process_update(&nav, &outbound, message_update(VISITOR, "Where?|Here")).await;

    assert_eq!(outbound.sent(), vec![Sent::Ack("cb-1".into())]);
    assert!(nav.store().questions_by_language("en").await.expect("list").is_empty());
}

#[tokio::test]
async fn edit_text_without_source_message_is_dropped() {
    let outbound = FakeOutbound::default();
    let event = InboundEvent {
        user_id: UserId(1),
        chat_id: ChatId(1),
        message_id: None,
        kind: EventKind::Callback {
            data: "back_4".into(),
        },
    };
    apply_render(
        &outbound,
        &event,
        &Render::EditText {
            text: "Choose a question:".into(),
            menu: MenuView::default(),
        },
    )
    .await
    .expect("apply");
    assert!(outbound.sent().is_empty());
}
