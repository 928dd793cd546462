use serde::Serialize;


/// Rows to be shown as table, plus the message to show instead if there are
/// none. `emptyMessage` is only serialized for empty listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Listing<T> {
    pub(crate) rows: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_message: Option<String>,
}

impl<T> Listing<T> {
    pub(crate) fn new(rows: Vec<T>, empty_message: impl Into<String>) -> Self {
        let empty_message = rows.is_empty().then(|| empty_message.into());
        Self { rows, empty_message }
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::Listing;

    #[test]
    fn message_only_without_rows() {
        let empty = Listing::<u32>::new(vec![], "No videos in this course yet");
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({ "rows": [], "emptyMessage": "No videos in this course yet" }),
        );

        let full = Listing::new(vec![1, 2], "No videos in this course yet");
        assert_eq!(serde_json::to_value(&full).unwrap(), json!({ "rows": [1, 2] }));
    }
}
