mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Fixture, OTHER, VIEWER};
use secrets_feed::state::{CommentsView, Notice};
use secrets_feed::{
    CommentId, CommentPanel, FeedConfig, FeedError, LoadPhase, MutationIntent, Precondition,
    PostViewModel, Request, Response,
};

async fn fixture_with_post() -> Fixture {
    let f = Fixture::new().await;
    f.seed_post(OTHER, 1, "i read my sister's diary").await;
    f.app
        .emit(Request::LoadPost { post_id: "p1".into() })
        .await
        .unwrap();
    f
}

fn submit(text: &str) -> Request {
    Request::SubmitComment {
        post_id: "p1".into(),
        text: text.into(),
    }
}

fn toggle_panel() -> Request {
    Request::ToggleComments { post_id: "p1".into() }
}

fn view(f: &Fixture) -> CommentsView {
    f.app.read::<CommentsView>(&CommentsView::path("p1")).unwrap()
}

fn record_views(f: &Fixture) -> Arc<Mutex<Vec<CommentsView>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_c = seen.clone();
    f.app.subscribe("post/+/comments", move |_, v| {
        if let Some(view) = v.downcast_ref::<CommentsView>() {
            seen_c.lock().unwrap().push(view.clone());
        }
    });
    seen
}

async fn wait_for_pending(vm: &PostViewModel, n: usize) {
    for _ in 0..500 {
        if vm.snapshot().pending_comments() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("expected {n} pending comments");
}

#[tokio::test]
async fn comment_confirmed_is_replaced_by_server_record() {
    let f = fixture_with_post().await;
    let seen = record_views(&f);

    let resp = f.app.emit(submit("hello")).await.unwrap();
    let Response::Comment(submission) = resp else {
        panic!("unexpected response {resp:?}");
    };
    assert!(submission.reconciled);
    assert_eq!(submission.count, 1);

    let seen = seen.lock().unwrap();
    let applied = &seen[0];
    assert_eq!(applied.count, 1);
    assert_eq!(applied.comments.len(), 1);
    assert_eq!(
        applied.comments[0].id,
        CommentId::Provisional(submission.provisional)
    );
    assert_eq!(applied.comments[0].author_handle, "SilentFox_101");

    let settled = view(&f);
    assert_eq!(settled.count, 1);
    assert_eq!(settled.comments.len(), 1);
    let comment = &settled.comments[0];
    assert_eq!(comment.content, "hello");
    assert!(!comment.id.is_provisional());
    assert_eq!(comment.author_id, VIEWER);
    assert_eq!(settled.panel.load, LoadPhase::Loaded);
    assert_eq!(f.stored_counts("p1").1, 1);
}

#[tokio::test]
async fn comment_failure_removes_provisional() {
    let f = fixture_with_post().await;
    let seen = record_views(&f);
    f.sink.fail_next(1);

    let err = f.app.emit(submit("hello")).await.unwrap_err();
    let FeedError::RemoteMutationFailed {
        intent: MutationIntent::AddComment { provisional },
        ..
    } = err
    else {
        panic!("unexpected error {err:?}");
    };

    let counts: Vec<u32> = seen.lock().unwrap().iter().map(|v| v.count).collect();
    assert_eq!(counts, vec![1, 0]);

    let settled = view(&f);
    assert!(settled.comments.is_empty());
    assert_eq!(settled.count, 0);
    assert!(
        settled
            .comments
            .iter()
            .all(|c| c.id != CommentId::Provisional(provisional))
    );
    assert_eq!(f.stored_counts("p1").1, 0);

    let notice = f.app.read::<Notice>(Notice::PATH).unwrap();
    assert_eq!(notice.intent, MutationIntent::AddComment { provisional });
}

#[tokio::test]
async fn blank_comment_changes_nothing() {
    let f = fixture_with_post().await;
    f.app
        .emit(Request::SetDraft {
            post_id: "p1".into(),
            text: "   ".into(),
        })
        .await
        .unwrap();
    let before = view(&f);

    let err = f.app.emit(submit(" \n\t ")).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::PreconditionNotMet(Precondition::EmptyComment)
    ));
    assert_eq!(f.sink.calls(), 0);
    assert_eq!(view(&f), before);
}

#[tokio::test]
async fn comment_without_viewer_changes_nothing() {
    let f = fixture_with_post().await;
    f.identity.sign_out();
    let before = view(&f);

    let err = f.app.emit(submit("hi")).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::PreconditionNotMet(Precondition::NoViewer)
    ));
    assert_eq!(f.sink.calls(), 0);
    assert_eq!(view(&f), before);
}

#[tokio::test]
async fn overlong_comment_is_rejected() {
    let f = Fixture::with_config(FeedConfig {
        max_comment_len: 5,
        ..FeedConfig::default()
    })
    .await;
    f.seed_post(OTHER, 1, "x").await;
    f.app
        .emit(Request::LoadPost { post_id: "p1".into() })
        .await
        .unwrap();

    let err = f.app.emit(submit("toolong")).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
    assert_eq!(f.sink.calls(), 0);
    // Surrounding whitespace does not count.
    assert!(f.app.emit(submit("  fine  ")).await.is_ok());
}

#[tokio::test]
async fn submission_clears_draft_and_trims() {
    let f = fixture_with_post().await;
    f.app
        .emit(Request::SetDraft {
            post_id: "p1".into(),
            text: "  me too  ".into(),
        })
        .await
        .unwrap();
    assert_eq!(view(&f).draft, "  me too  ");

    f.app.emit(submit("  me too  ")).await.unwrap();
    let settled = view(&f);
    assert!(settled.draft.is_empty());
    assert_eq!(settled.comments[0].content, "me too");
}

#[tokio::test]
async fn placeholder_author_when_profile_not_cached() {
    let f = fixture_with_post().await;
    f.identity.sign_in(secrets_feed::Viewer::new("ghost"));
    let seen = record_views(&f);

    f.app.emit(submit("boo")).await.unwrap();
    let applied = seen.lock().unwrap()[0].clone();
    assert_eq!(applied.comments[0].author_handle, "Anonymous");
    assert_eq!(applied.comments[0].author_avatar_color, "#555");

    // "ghost" has no users row, so the joined list keeps the placeholder.
    assert_eq!(view(&f).comments[0].author_handle, "Anonymous");
}

#[tokio::test]
async fn panel_fetches_once_and_caches_across_collapse() {
    let f = fixture_with_post().await;
    f.seed_comment(OTHER, "p1", 2, "second").await;
    f.seed_comment(VIEWER, "p1", 1, "first").await;
    let queries = f.source.calls();

    let resp = f.app.emit(toggle_panel()).await.unwrap();
    assert_eq!(
        resp,
        Response::Panel(CommentPanel {
            visible: true,
            load: LoadPhase::Loaded
        })
    );
    let loaded = view(&f);
    let texts: Vec<&str> = loaded.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(loaded.comments[1].author_handle, "NeonOwl_202");
    assert_eq!(loaded.count, 2);
    let after_first = f.source.calls();
    assert!(after_first > queries);

    let hidden = f.app.emit(toggle_panel()).await.unwrap();
    assert_eq!(
        hidden,
        Response::Panel(CommentPanel {
            visible: false,
            load: LoadPhase::Loaded
        })
    );
    f.app.emit(toggle_panel()).await.unwrap();
    assert_eq!(f.source.calls(), after_first);
    assert_eq!(view(&f).comments.len(), 2);
}

#[tokio::test]
async fn submission_refreshes_loaded_list() {
    let f = fixture_with_post().await;
    f.seed_comment(OTHER, "p1", 1, "old").await;
    f.app.emit(toggle_panel()).await.unwrap();

    // Someone else comments; the cached list does not know yet.
    f.seed_comment(OTHER, "p1", 2, "sneaky").await;
    assert_eq!(view(&f).comments.len(), 1);

    f.app.emit(submit("mine")).await.unwrap();
    let settled = view(&f);
    let texts: Vec<&str> = settled.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["old", "sneaky", "mine"]);
    assert_eq!(settled.count, 3);
}

#[tokio::test]
async fn panel_fetch_failure_allows_retry() {
    let f = fixture_with_post().await;
    f.seed_comment(OTHER, "p1", 1, "hi").await;
    f.source.fail_table("comments");

    let err = f.app.emit(toggle_panel()).await.unwrap_err();
    assert_eq!(err.error_code(), "REMOTE_QUERY_FAILED");
    let panel = view(&f).panel;
    assert!(panel.visible);
    assert_eq!(panel.load, LoadPhase::NotLoaded);

    f.source.heal();
    f.app.emit(toggle_panel()).await.unwrap();
    let resp = f.app.emit(toggle_panel()).await.unwrap();
    assert_eq!(
        resp,
        Response::Panel(CommentPanel {
            visible: true,
            load: LoadPhase::Loaded
        })
    );
    assert_eq!(view(&f).comments.len(), 1);
}

#[tokio::test]
async fn refetch_failure_keeps_provisional() {
    let f = fixture_with_post().await;
    f.source.fail_table("comments");

    let resp = f.app.emit(submit("still here")).await.unwrap();
    let Response::Comment(submission) = resp else {
        panic!("unexpected response {resp:?}");
    };
    assert!(!submission.reconciled);
    assert_eq!(submission.count, 1);

    let settled = view(&f);
    assert_eq!(settled.comments.len(), 1);
    assert!(settled.comments[0].id.is_provisional());
    assert_eq!(f.stored_counts("p1").1, 1);
    let vm = f.app.coordinator().view_model("p1").unwrap();
    assert_eq!(vm.snapshot().pending_comments(), 0);
}

#[tokio::test]
async fn concurrent_submissions_both_land() {
    let f = fixture_with_post().await;
    f.sink.hold();

    let observer = async {
        f.sink.wait_for_calls(2).await;
        let pending = view(&f);
        assert_eq!(pending.count, 2);
        assert!(pending.comments.iter().all(|c| c.id.is_provisional()));
        f.sink.release(2);
    };
    let (a, b, ()) = tokio::join!(
        f.app.emit(submit("a")),
        f.app.emit(submit("b")),
        observer
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    let settled = view(&f);
    assert_eq!(settled.count, 2);
    assert!(settled.comments.iter().all(|c| !c.id.is_provisional()));
    assert_eq!(f.stored_counts("p1").1, 2);
}

#[tokio::test]
async fn failed_submission_leaves_concurrent_one_alone() {
    let f = fixture_with_post().await;
    let vm = f.app.coordinator().view_model("p1").unwrap();
    f.sink.hold();
    f.sink.fail_next(1);

    let second = async {
        f.sink.wait_for_calls(1).await;
        let driver = async {
            f.sink.wait_for_calls(2).await;
            // The gate is first come, first served: the failing call goes first.
            f.sink.release(1);
            wait_for_pending(&vm, 1).await;
            let mid = view(&f);
            assert_eq!(mid.count, 1);
            assert_eq!(mid.comments.len(), 1);
            assert_eq!(mid.comments[0].content, "kept");
            f.sink.release(1);
        };
        let (kept, ()) = tokio::join!(f.app.emit(submit("kept")), driver);
        kept
    };
    let (lost, kept) = tokio::join!(f.app.emit(submit("lost")), second);

    assert!(lost.is_err());
    assert!(kept.is_ok());
    let settled = view(&f);
    let texts: Vec<&str> = settled.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["kept"]);
    assert_eq!(settled.count, 1);
}
