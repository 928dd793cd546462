use super::{Choice, Field, FieldKind, Form, ParamType};


/// Names of all forms, in the order they are listed.
pub(crate) const ALL: &[&str] = &[
    "create_series",
    "add_attachment",
    "add_transcription",
    "delete_transcription",
    "change_owner",
];

pub(crate) fn by_name(name: &str) -> Option<Form> {
    let form = match name {
        "create_series" => create_series(),
        "add_attachment" => add_attachment(),
        "add_transcription" => add_transcription(),
        "delete_transcription" => delete_transcription(),
        "change_owner" => change_owner(),
        _ => return None,
    };
    Some(form)
}


const ATTACHMENT_TYPES: &[Choice] = &[
    Choice { value: "preview", label: "Preview image" },
    Choice { value: "thumbnail", label: "Thumbnail" },
    Choice { value: "slides", label: "Slides" },
];

const TRANSCRIPTION_LANGUAGES: &[Choice] = &[
    Choice { value: "en", label: "English" },
    Choice { value: "de", label: "German" },
    Choice { value: "fr", label: "French" },
    Choice { value: "es", label: "Spanish" },
    Choice { value: "it", label: "Italian" },
];

const OWNER_TARGETS: &[Choice] = &[
    Choice { value: "series", label: "Series" },
    Choice { value: "video", label: "Video" },
];

fn field(name: &'static str, label: &'static str, kind: FieldKind, param: ParamType) -> Field {
    Field { name, label, kind, param, required: true }
}

fn optional(field: Field) -> Field {
    Field { required: false, ..field }
}

/// Fields every form carries.
fn context_fields(video_form: bool) -> Vec<Field> {
    let mut fields = vec![
        field("courseid", "", FieldKind::Hidden, ParamType::Int),
        field("ocinstanceid", "", FieldKind::Hidden, ParamType::Int),
    ];
    if video_form {
        fields.push(field("video_identifier", "", FieldKind::Hidden, ParamType::AlphaNumExt));
    }
    fields
}

fn create_series() -> Form {
    let mut fields = context_fields(false);
    fields.extend([
        field("title", "Title", FieldKind::Text, ParamType::NoTags),
        optional(field("description", "Description", FieldKind::TextArea, ParamType::Text)),
    ]);

    Form { name: "create_series", handler: "create_series", video_form: false, fields }
}

fn add_attachment() -> Form {
    let mut fields = context_fields(true);
    fields.extend([
        field(
            "attachment_type",
            "Attachment type",
            FieldKind::Radio { options: ATTACHMENT_TYPES },
            ParamType::AlphaNumExt,
        ),
        field(
            "attachment_file",
            "File",
            FieldKind::FilePicker { accepted_types: &[".png", ".jpg", ".jpeg", ".pdf"] },
            ParamType::Int,
        ),
    ]);

    Form { name: "add_attachment", handler: "add_attachment", video_form: true, fields }
}

fn add_transcription() -> Form {
    let mut fields = context_fields(true);
    fields.extend([
        field(
            "transcription_language",
            "Language",
            FieldKind::Select { options: TRANSCRIPTION_LANGUAGES },
            ParamType::AlphaNumExt,
        ),
        field(
            "transcription_file",
            "Transcription file",
            FieldKind::FilePicker { accepted_types: &[".vtt"] },
            ParamType::Int,
        ),
    ]);

    Form { name: "add_transcription", handler: "add_transcription", video_form: true, fields }
}

fn delete_transcription() -> Form {
    let mut fields = context_fields(true);
    fields.push(field("transcription_id", "", FieldKind::Hidden, ParamType::AlphaNumExt));

    Form {
        name: "delete_transcription",
        handler: "delete_transcription",
        video_form: true,
        fields,
    }
}

fn change_owner() -> Form {
    let mut fields = context_fields(false);
    fields.extend([
        field("target_type", "", FieldKind::Radio { options: OWNER_TARGETS }, ParamType::AlphaNumExt),
        field("target_identifier", "", FieldKind::Hidden, ParamType::AlphaNumExt),
        field("new_owner", "New owner", FieldKind::Text, ParamType::Int),
    ]);

    Form { name: "change_owner", handler: "change_owner", video_form: false, fields }
}
