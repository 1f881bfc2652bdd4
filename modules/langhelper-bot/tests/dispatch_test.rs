//! Dispatch loop and command handlers against a scripted feed and an
//! in-memory store.

mod harness;

use chrono::Utc;

use harness::{button, photo, text, wait_until, TestBot};
use langhelper_bot::delivery::ReplyAction;
use langhelper_bot::dispatch::handlers::{GUIDANCE_REPLY, WELCOME_REPLY};
use langhelper_bot::fixtures::Sent;
use langhelper_bot::{DispatchError, FeedError, HandlerError};
use langhelper_common::ChatId;
use langhelper_store::{StoreError, WordStore};

fn reply(chat: i64, body: &str) -> Sent {
    Sent::Text {
        chat_id: ChatId(chat),
        text: body.to_string(),
        actions: vec![],
    }
}

// =========================================================================
// Handlers
// =========================================================================

#[tokio::test]
async fn insert_then_lookup_round_trip() {
    let bot = TestBot::new();
    let handlers = bot.handlers();

    handlers
        .handle_insert("gregarious\nfond of company", "A1")
        .await
        .unwrap();

    let word = bot.store.get_word_by_text("gregarious").await.unwrap().unwrap();
    assert_eq!(word.meaning, "fond of company");
    assert_eq!(word.attachment_ref, "A1");

    handlers
        .handle_lookup("/meaning Gregarious", ChatId(7))
        .await
        .unwrap();
    handlers
        .handle_lookup("/meaning_with_example gregarious", ChatId(7))
        .await
        .unwrap();

    assert_eq!(
        bot.delivery.sent(),
        vec![
            reply(7, "Gregarious\nfond of company"),
            Sent::Attachment {
                chat_id: ChatId(7),
                attachment_ref: "A1".into(),
                caption: "Gregarious\nfond of company".into(),
            },
        ]
    );
}

#[tokio::test]
async fn start_with_no_words_registers_without_seeding() {
    let bot = TestBot::new();
    bot.handlers().handle_start(ChatId(3)).await.unwrap();

    assert_eq!(bot.store.list_user_ids().await.unwrap(), vec![ChatId(3)]);
    assert!(bot.store.progress_for(ChatId(3)).is_empty());
    assert_eq!(bot.delivery.sent(), vec![reply(3, WELCOME_REPLY)]);
}

#[tokio::test]
async fn start_seeds_existing_words() {
    let bot = TestBot::new();
    let handlers = bot.handlers();
    handlers.handle_insert("terse\nbrief", "A2").await.unwrap();
    handlers.handle_insert("laconic\nusing few words", "A3").await.unwrap();

    handlers.handle_start(ChatId(4)).await.unwrap();

    let words: Vec<String> = bot
        .store
        .progress_for(ChatId(4))
        .into_iter()
        .map(|p| p.word)
        .collect();
    assert_eq!(words, vec!["laconic", "terse"]);
}

#[tokio::test]
async fn insert_seeds_known_users() {
    let bot = TestBot::new();
    let handlers = bot.handlers();
    handlers.handle_start(ChatId(1)).await.unwrap();
    handlers.handle_start(ChatId(2)).await.unwrap();

    handlers.handle_insert("cogent\nclear and convincing", "A4").await.unwrap();

    for user in [ChatId(1), ChatId(2)] {
        let progress = bot.store.progress_for(user);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].word, "cogent");
        assert!(progress[0].last_asked.is_none());
    }
}

#[tokio::test]
async fn random_before_start_sends_guidance() {
    let bot = TestBot::new();
    bot.handlers().handle_insert("terse\nbrief", "A2").await.unwrap();

    bot.handlers().handle_random(ChatId(5)).await.unwrap();

    assert_eq!(bot.delivery.sent(), vec![reply(5, GUIDANCE_REPLY)]);
}

#[tokio::test]
async fn random_offers_three_actions_and_marks_word_asked() {
    let bot = TestBot::new();
    let handlers = bot.handlers();
    handlers.handle_insert("brusque\nabrupt", "A5").await.unwrap();
    handlers.handle_start(ChatId(6)).await.unwrap();

    handlers.handle_random(ChatId(6)).await.unwrap();

    let sent = bot.delivery.sent();
    assert_eq!(
        sent.last().unwrap(),
        &Sent::Text {
            chat_id: ChatId(6),
            text: "Brusque".into(),
            actions: vec![
                ReplyAction::new("Show Meaning", "/meaning brusque"),
                ReplyAction::new("Show Meaning (With Example)", "/meaning_with_example brusque"),
                ReplyAction::new("Next Word", "/random"),
            ],
        }
    );
    assert!(bot.store.progress_for(ChatId(6))[0].last_asked.is_some());
}

#[tokio::test]
async fn lookup_without_word_is_malformed_and_silent() {
    let bot = TestBot::new();
    let err = bot
        .handlers()
        .handle_lookup("/meaning", ChatId(8))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::MalformedCommand(_)));
    assert!(bot.delivery.sent().is_empty());
}

#[tokio::test]
async fn lookup_of_unknown_word_is_not_found() {
    let bot = TestBot::new();
    let err = bot
        .handlers()
        .handle_lookup("/meaning zephyr", ChatId(8))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::NotFound(w) if w == "zephyr"));
    assert!(bot.delivery.sent().is_empty());
}

#[tokio::test]
async fn single_line_caption_is_rejected() {
    let bot = TestBot::new();
    let err = bot.handlers().handle_insert("gregarious", "A1").await.unwrap_err();

    assert!(matches!(err, HandlerError::MalformedCaption));
    assert!(bot.store.get_all_words().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_insert_surfaces_store_error() {
    let bot = TestBot::new();
    bot.store
        .insert_word("terse", "brief", "A2", Utc::now())
        .await
        .unwrap();

    let err = bot.handlers().handle_insert("Terse\nshort", "A9").await.unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Store(StoreError::DuplicateWord(w)) if w == "terse"
    ));
}

#[tokio::test]
async fn duplicate_insert_seeds_known_users() {
    let bot = TestBot::new();
    let user = ChatId(7);
    bot.store.insert_user(user, Utc::now()).await.unwrap();
    // Word row exists but was never seeded for the user.
    bot.store
        .insert_word("terse", "brief", "A2", Utc::now())
        .await
        .unwrap();
    assert!(bot.store.progress_for(user).is_empty());

    let err = bot.handlers().handle_insert("terse
brief", "A2").await.unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Store(StoreError::DuplicateWord(w)) if w == "terse"
    ));

    let progress = bot.store.progress_for(user);
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].word, "terse");
    assert_eq!(progress[0].last_asked, None);
}

// =========================================================================
// Dispatch loop
// =========================================================================

#[tokio::test]
async fn events_are_handled_in_arrival_order() {
    let bot = TestBot::new();
    bot.source.push(vec![
        text(1, "/start"),
        photo(1, "gregarious\nfond of company", "A1"),
    ]);
    bot.source.push(vec![text(1, "/random")]);

    let (feed, dispatch) = bot.start().await;
    bot.wait_for_sent(2).await;

    // The random pick depends on the start and the insert having run first.
    let sent = bot.delivery.sent();
    assert_eq!(sent[0], reply(1, WELCOME_REPLY));
    assert!(matches!(&sent[1], Sent::Text { text, .. } if text == "Gregarious"));

    bot.cancel.cancel();
    assert!(feed.await.unwrap().is_ok());
    assert!(dispatch.await.unwrap().is_ok());
    assert_eq!(
        bot.source.registered_commands(),
        vec!["/start", "/random", "/meaning", "/meaning_with_example"]
    );
}

#[tokio::test]
async fn failing_handlers_do_not_stop_the_loop() {
    let bot = TestBot::new();
    bot.source.push(vec![
        text(5, "/meaning zephyr"),
        text(5, "/meaning"),
        photo(5, "only one line", "A1"),
        text(5, "just chatting"),
        langhelper_bot::feed::InboundEvent::Unrecognized { update_id: 99 },
        text(5, "/random"),
    ]);

    let (_feed, dispatch) = bot.start().await;
    bot.wait_for_sent(1).await;

    assert_eq!(bot.delivery.sent(), vec![reply(5, GUIDANCE_REPLY)]);
    assert!(!dispatch.is_finished());
    bot.cancel.cancel();
    assert!(dispatch.await.unwrap().is_ok());
}

#[tokio::test]
async fn delivery_failure_is_contained() {
    let bot = TestBot::new();
    bot.delivery.fail_next(1);
    bot.source.push(vec![text(5, "/random"), text(6, "/random")]);

    let (_feed, dispatch) = bot.start().await;
    bot.wait_for_sent(1).await;

    assert_eq!(bot.delivery.sent(), vec![reply(6, GUIDANCE_REPLY)]);
    assert_eq!(bot.delivery.attempts(), 2);
    bot.cancel.cancel();
    assert!(dispatch.await.unwrap().is_ok());
}

#[tokio::test]
async fn panicking_handler_is_recovered() {
    let bot = TestBot::new();
    bot.delivery.panic_for(ChatId(13));
    bot.source.push(vec![text(13, "/start"), text(14, "/random")]);

    let (_feed, dispatch) = bot.start().await;
    bot.wait_for_sent(1).await;

    assert_eq!(bot.delivery.sent(), vec![reply(14, GUIDANCE_REPLY)]);
    bot.cancel.cancel();
    assert!(dispatch.await.unwrap().is_ok());
}

#[tokio::test]
async fn button_press_runs_its_command() {
    let bot = TestBot::new();
    bot.handlers().handle_insert("affable\nfriendly", "A7").await.unwrap();
    bot.source.push(vec![button(9, "/meaning_with_example affable")]);

    let (_feed, _dispatch) = bot.start().await;
    bot.wait_for_sent(1).await;

    assert_eq!(
        bot.delivery.sent(),
        vec![Sent::Attachment {
            chat_id: ChatId(9),
            attachment_ref: "A7".into(),
            caption: "Affable\nfriendly".into(),
        }]
    );
    bot.cancel.cancel();
}

#[tokio::test]
async fn buffered_events_are_drained_on_cancel() {
    let bot = TestBot::new();
    bot.source
        .push(vec![text(1, "/start"), text(2, "/random"), text(3, "/random")]);

    let feed = bot.start_feed().await;
    // A second fetch means the whole first batch is buffered in the stream.
    wait_until(|| bot.source.offsets().len() >= 2).await;

    bot.source.cancel_on_register(bot.cancel.clone());
    let dispatch = bot.spawn_dispatcher();

    assert!(dispatch.await.unwrap().is_ok());
    assert!(feed.await.unwrap().is_ok());
    assert_eq!(
        bot.delivery.sent(),
        vec![
            reply(1, WELCOME_REPLY),
            reply(2, GUIDANCE_REPLY),
            reply(3, GUIDANCE_REPLY),
        ]
    );
}

#[tokio::test]
async fn rejected_command_registration_is_fatal() {
    let bot = TestBot::new();
    bot.source.reject_commands();

    let (_feed, dispatch) = bot.start().await;
    let err = dispatch.await.unwrap().unwrap_err();
    assert!(matches!(err, DispatchError::Feed(FeedError::Registration(_))));
    bot.cancel.cancel();
}

#[tokio::test]
async fn dispatcher_waiting_for_feed_stops_on_cancel() {
    let bot = TestBot::new();
    let dispatch = bot.spawn_dispatcher();
    bot.cancel.cancel();

    let err = dispatch.await.unwrap().unwrap_err();
    assert!(matches!(err, DispatchError::Feed(FeedError::Cancelled)));
    assert!(bot.delivery.sent().is_empty());
}
