use serde::{Deserialize, Serialize};

/// `GET /v1/models` response body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

impl Default for ModelList {
    fn default() -> Self {
        Self {
            object: "list".to_string(),
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

impl ModelList {
    pub fn from_model_names<I, S>(models: I, owned_by: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = models
            .into_iter()
            .map(|model| ModelEntry {
                id: model.into(),
                object: "model".to_string(),
                owned_by: owned_by.to_string(),
            })
            .collect();

        Self {
            data,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_become_model_entries() {
        let list = ModelList::from_model_names(["gpt-5.1-codex", "gpt-5.1"], "openai");
        assert_eq!(list.object, "list");
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[1].id, "gpt-5.1");
        assert_eq!(list.data[1].object, "model");
        assert_eq!(list.data[0].owned_by, "openai");
    }
}
