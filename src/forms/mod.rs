//! Typed request validation for the forms of the course integration.
//!
//! Each form is a static schema ([`Form`]). [`Form::validate`] checks user
//! input against it and either produces a [`Submission`] (the value map plus
//! the name of the command handler that should process it) or field-scoped
//! error messages. The handlers themselves live in the host LMS.

use std::{collections::{BTreeMap, HashMap}, future::Future};

use serde::Serialize;

use crate::{
    model::VideoId,
    opencast::OcClient,
    prelude::*,
};

mod definitions;

#[cfg(test)]
mod tests;

pub(crate) use self::definitions::{by_name, ALL};


#[derive(Debug, Clone, Serialize)]
pub(crate) struct Form {
    pub(crate) name: &'static str,

    /// Name of the external command handler valid submissions are passed to.
    pub(crate) handler: &'static str,

    /// Whether the form operates on a single video, identified by the
    /// `video_identifier` field.
    pub(crate) video_form: bool,

    pub(crate) fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Field {
    pub(crate) name: &'static str,
    pub(crate) label: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) param: ParamType,
    pub(crate) required: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum FieldKind {
    Hidden,
    Text,
    TextArea,
    Radio { options: &'static [Choice] },
    Select { options: &'static [Choice] },
    /// The value is the item ID of the draft area the file was uploaded to.
    /// If `accepted_types` is not empty, the file name (field
    /// `<name>_filename`) must have one of these extensions.
    FilePicker { accepted_types: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct Choice {
    pub(crate) value: &'static str,
    pub(crate) label: &'static str,
}

/// How a submitted value is cleaned and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum ParamType {
    /// Non-negative integer.
    Int,
    /// Letters, digits, `_` and `-`.
    AlphaNumExt,
    /// Any text, trimmed.
    Text,
    /// Text with all HTML tags removed.
    NoTags,
}

/// A successfully validated form.
#[derive(Debug, Serialize)]
pub(crate) struct Submission {
    pub(crate) handler: &'static str,
    pub(crate) values: BTreeMap<String, String>,
}

/// Error message per field name.
pub(crate) type FieldErrors = BTreeMap<String, String>;

/// What to show for a requested form.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub(crate) enum FormView {
    Form { form: Form },
    /// The resource the form operates on does not exist. Only the `cancel`
    /// action is offered.
    Unavailable { message: String, actions: Vec<&'static str> },
}

impl FormView {
    fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), actions: vec!["cancel"] }
    }
}


impl Form {
    pub(crate) fn validate(&self, input: &HashMap<String, String>) -> Result<Submission, FieldErrors> {
        let mut values = BTreeMap::new();
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            match field.check(input) {
                Ok(None) => {}
                Ok(Some(cleaned)) => {
                    values.extend(cleaned);
                }
                Err(msg) => {
                    errors.insert(field.name.to_owned(), msg);
                }
            }
        }

        if errors.is_empty() {
            Ok(Submission { handler: self.handler, values })
        } else {
            Err(errors)
        }
    }

    /// Decides what to show when the form is requested with the given
    /// parameters. For video forms, the video has to exist on the instance.
    pub(crate) async fn view(
        self,
        params: &HashMap<String, String>,
        videos: &impl VideoLookup,
    ) -> Result<FormView> {
        if self.video_form {
            let id = params.get("video_identifier")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty());
            let Some(id) = id else {
                return Ok(FormView::unavailable("No video was specified."));
            };

            let id = VideoId(id.to_owned());
            if !videos.video_exists(&id).await? {
                debug!("Video {id} for form '{}' does not exist", self.name);
                return Ok(FormView::unavailable(format!(
                    "The video '{id}' could not be found. It might have been deleted.",
                )));
            }
        }

        Ok(FormView::Form { form: self })
    }
}

impl Field {
    /// Returns the cleaned `(name, value)` pairs for this field, `None` if an
    /// optional field was left empty, or the error message.
    fn check(&self, input: &HashMap<String, String>) -> Result<Option<Vec<(String, String)>>, String> {
        let raw = input.get(self.name).map(|s| s.trim()).unwrap_or("");
        let value = match self.param {
            ParamType::NoTags => strip_tags(raw).trim().to_owned(),
            _ => raw.to_owned(),
        };

        if value.is_empty() {
            return if self.required { Err("required".into()) } else { Ok(None) };
        }

        match self.param {
            ParamType::Int if value.parse::<u64>().is_err() => {
                return Err("must be a non-negative integer".into());
            }
            ParamType::AlphaNumExt
                if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
            {
                return Err("may only contain letters, digits, '_' and '-'".into());
            }
            _ => {}
        }

        let mut out = vec![(self.name.to_owned(), value.clone())];
        match &self.kind {
            FieldKind::Radio { options } | FieldKind::Select { options } => {
                if !options.iter().any(|o| o.value == value) {
                    return Err("invalid choice".into());
                }
            }
            FieldKind::FilePicker { accepted_types } => {
                let key = format!("{}_filename", self.name);
                let filename = input.get(&key).map(|s| s.trim()).unwrap_or("");
                if !accepted_types.is_empty() {
                    let accepted = filename.rsplit_once('.')
                        .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()))
                        .is_some_and(|ext| accepted_types.iter().any(|t| *t == ext));
                    if !accepted {
                        return Err(format!(
                            "file type not accepted, allowed: {}",
                            accepted_types.join(", "),
                        ));
                    }
                }
                if !filename.is_empty() {
                    out.push((key, filename.to_owned()));
                }
            }
            FieldKind::Hidden | FieldKind::Text | FieldKind::TextArea => {}
        }

        Ok(Some(out))
    }
}

/// Removes everything between `<` and `>`, including the brackets.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}


/// Checks whether a video exists on an Opencast instance.
pub(crate) trait VideoLookup: Send + Sync {
    fn video_exists(&self, id: &VideoId) -> impl Future<Output = Result<bool>> + Send;
}

impl VideoLookup for OcClient {
    async fn video_exists(&self, id: &VideoId) -> Result<bool> {
        Ok(self.video(id).await?.is_some())
    }
}
