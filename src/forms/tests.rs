use std::collections::HashMap;

use crate::model::VideoId;
use super::*;


fn input(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn input_with(base: &[(&str, &str)], extra: &[(&str, &str)]) -> HashMap<String, String> {
    input(&[base, extra].concat())
}

fn form(name: &str) -> Form {
    by_name(name).unwrap()
}

#[test]
fn all_forms_exist_and_carry_context() {
    for name in ALL {
        let form = form(name);
        assert_eq!(form.name, *name);
        let has = |field: &str| form.fields.iter().any(|f| f.name == field);
        assert!(has("courseid"), "{name}");
        assert!(has("ocinstanceid"), "{name}");
        assert_eq!(has("video_identifier"), form.video_form, "{name}");
    }
    assert!(by_name("delete_everything").is_none());
}

#[test]
fn create_series_valid() {
    let submission = form("create_series")
        .validate(&input(&[
            ("courseid", "12"),
            ("ocinstanceid", " 1 "),
            ("title", "  <b>Lecture</b> 2024 "),
            ("description", "Weekly <i>recordings</i>"),
            ("unrelated", "ignored"),
        ]))
        .unwrap();

    assert_eq!(submission.handler, "create_series");
    assert_eq!(submission.values["ocinstanceid"], "1");
    assert_eq!(submission.values["title"], "Lecture 2024");
    assert_eq!(submission.values["description"], "Weekly <i>recordings</i>");
    assert!(!submission.values.contains_key("unrelated"));
}

#[test]
fn required_and_type_errors() {
    let errors = form("create_series")
        .validate(&input(&[("courseid", "-3"), ("title", "<br/>")]))
        .unwrap_err();

    assert_eq!(errors["courseid"], "must be a non-negative integer");
    assert_eq!(errors["ocinstanceid"], "required");
    assert_eq!(errors["title"], "required");
    assert!(!errors.contains_key("description"));
}

#[test]
fn alphanum_ext() {
    let base = [("courseid", "1"), ("ocinstanceid", "1"), ("transcription_id", "a1b2-c3_d4")];
    let ok = form("delete_transcription")
        .validate(&input_with(&base, &[("video_identifier", "0b3a-11ee")]))
        .unwrap();
    assert_eq!(ok.values["video_identifier"], "0b3a-11ee");

    let errors = form("delete_transcription")
        .validate(&input_with(&base, &[("video_identifier", "../etc")]))
        .unwrap_err();
    assert!(errors.contains_key("video_identifier"));
    assert_eq!(errors.len(), 1);
}

#[test]
fn choices() {
    let base = [
        ("courseid", "1"),
        ("ocinstanceid", "1"),
        ("video_identifier", "v1"),
        ("attachment_file", "815"),
        ("attachment_file_filename", "Slides.PDF"),
    ];
    let ok = form("add_attachment")
        .validate(&input_with(&base, &[("attachment_type", "slides")]))
        .unwrap();
    assert_eq!(ok.values["attachment_type"], "slides");
    assert_eq!(ok.values["attachment_file"], "815");
    assert_eq!(ok.values["attachment_file_filename"], "Slides.PDF");

    let errors = form("add_attachment")
        .validate(&input_with(&base, &[("attachment_type", "video")]))
        .unwrap_err();
    assert_eq!(errors["attachment_type"], "invalid choice");
}

#[test]
fn file_picker() {
    let base = [
        ("courseid", "1"),
        ("ocinstanceid", "1"),
        ("video_identifier", "v1"),
        ("transcription_language", "de"),
    ];
    let check = |extra: &[(&str, &str)]| form("add_transcription").validate(&input_with(&base, extra));

    assert!(check(&[("transcription_file", "77"), ("transcription_file_filename", "de.vtt")]).is_ok());
    assert_eq!(
        check(&[("transcription_file", "77"), ("transcription_file_filename", "de.srt")])
            .unwrap_err()["transcription_file"],
        "file type not accepted, allowed: .vtt",
    );
    assert_eq!(
        check(&[("transcription_file", "77")]).unwrap_err()["transcription_file"],
        "file type not accepted, allowed: .vtt",
    );
    assert_eq!(
        check(&[("transcription_file", "draft")]).unwrap_err()["transcription_file"],
        "must be a non-negative integer",
    );
    assert_eq!(check(&[]).unwrap_err()["transcription_file"], "required");
}

#[test]
fn tags_are_stripped() {
    assert_eq!(strip_tags("a <script>x</script> b"), "a x b");
    assert_eq!(strip_tags("1 > 0"), "1 > 0");
    assert_eq!(strip_tags("unclosed <tag"), "unclosed ");
}


struct FakeVideos(Vec<&'static str>);

impl VideoLookup for FakeVideos {
    async fn video_exists(&self, id: &VideoId) -> Result<bool> {
        Ok(self.0.iter().any(|v| *v == id.as_str()))
    }
}

#[tokio::test]
async fn view_of_existing_video() {
    let view = form("add_transcription")
        .view(&input(&[("video_identifier", "v1")]), &FakeVideos(vec!["v1"]))
        .await
        .unwrap();
    assert!(matches!(view, FormView::Form { form } if form.name == "add_transcription"));
}

#[tokio::test]
async fn view_of_missing_video() {
    let view = form("add_attachment")
        .view(&input(&[("video_identifier", "gone")]), &FakeVideos(vec!["v1"]))
        .await
        .unwrap();
    match view {
        FormView::Unavailable { message, actions } => {
            assert!(message.contains("gone"));
            assert_eq!(actions, ["cancel"]);
        }
        other => panic!("expected unavailable view, got {other:?}"),
    }

    let view = form("add_attachment")
        .view(&input(&[]), &FakeVideos(vec!["v1"]))
        .await
        .unwrap();
    assert!(matches!(view, FormView::Unavailable { .. }));
}

#[tokio::test]
async fn non_video_forms_need_no_lookup() {
    let view = form("create_series")
        .view(&input(&[]), &FakeVideos(vec![]))
        .await
        .unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["view"], "form");
    assert_eq!(json["form"]["fields"][0]["kind"]["type"], "hidden");
}
