use govern_policy::Operation;
use govern_types::{
    AccountDraft, AccountPatch, BulkUpload, EntityKind, FieldMap, LookupDraft, LookupPatch,
    PayloadError, TaskPayload,
};
use serde::{Deserialize, Serialize};

/// A mutation proposed by an actor, before the policy decides its fate.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitRequest {
    entity_id: Option<i64>,
    payload: TaskPayload,
}

impl SubmitRequest {
    /// Create request from a field mapping.
    pub fn create(entity: EntityKind, fields: &FieldMap) -> Result<Self, PayloadError> {
        let payload = match entity {
            EntityKind::Account => TaskPayload::CreateAccount(AccountDraft::from_fields(fields)?),
            EntityKind::LookupEntry => {
                TaskPayload::CreateLookupEntry(LookupDraft::from_fields(fields)?)
            }
        };
        Ok(Self {
            entity_id: None,
            payload,
        })
    }

    /// Partial update of the row at `id`.
    pub fn update(entity: EntityKind, id: i64, fields: &FieldMap) -> Result<Self, PayloadError> {
        let payload = match entity {
            EntityKind::Account => TaskPayload::UpdateAccount(AccountPatch::from_fields(fields)?),
            EntityKind::LookupEntry => {
                TaskPayload::UpdateLookupEntry(LookupPatch::from_fields(fields)?)
            }
        };
        Ok(Self {
            entity_id: Some(id),
            payload,
        })
    }

    pub fn delete(entity: EntityKind, id: i64) -> Self {
        let payload = match entity {
            EntityKind::Account => TaskPayload::DeleteAccount,
            EntityKind::LookupEntry => TaskPayload::DeleteLookupEntry,
        };
        Self {
            entity_id: Some(id),
            payload,
        }
    }

    /// Batch of rows, kept verbatim. Rows are only validated when replayed.
    pub fn bulk_upload(
        entity: EntityKind,
        source: impl Into<String>,
        records: Vec<FieldMap>,
    ) -> Result<Self, PayloadError> {
        let batch = BulkUpload::new(source, records);
        if !batch.is_well_formed() {
            return Err(PayloadError::Invalid(
                "bulk upload carries no records".to_string(),
            ));
        }
        let payload = match entity {
            EntityKind::Account => TaskPayload::BulkAccounts(batch),
            EntityKind::LookupEntry => TaskPayload::BulkLookupEntries(batch),
        };
        Ok(Self {
            entity_id: None,
            payload,
        })
    }

    /// Wrap an already typed payload.
    ///
    /// Updates and deletes need a target id; creations and uploads must not carry one.
    pub fn from_payload(entity_id: Option<i64>, payload: TaskPayload) -> Result<Self, PayloadError> {
        if let TaskPayload::Unreadable { reason, .. } = &payload {
            return Err(PayloadError::Undecodable(reason.clone()));
        }
        match (payload.targets_existing(), entity_id) {
            (true, None) => Err(PayloadError::Invalid(format!(
                "{} {} requires an entity id",
                payload.task_type(),
                payload.entity_kind()
            ))),
            (false, Some(_)) => Err(PayloadError::Invalid(format!(
                "{} {} does not take an entity id",
                payload.task_type(),
                payload.entity_kind()
            ))),
            _ => Ok(Self { entity_id, payload }),
        }
    }

    pub fn operation(&self) -> Operation {
        Operation::new(self.payload.task_type(), self.payload.entity_kind())
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.entity_id
    }

    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    pub(crate) fn into_parts(self) -> (Option<i64>, TaskPayload) {
        (self.entity_id, self.payload)
    }
}

/// An administrator's verdict on a pending task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Approve => f.write_str("approve"),
            Decision::Reject => f.write_str("reject"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govern_types::TaskType;
    use serde_json::json;

    fn map(value: serde_json::Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn update_carries_target_and_typed_patch() {
        let request = SubmitRequest::update(
            EntityKind::Account,
            9,
            &map(json!({"username": "x", "department": "Y"})),
        )
        .unwrap();
        assert_eq!(request.entity_id(), Some(9));
        assert_eq!(
            request.operation(),
            Operation::new(TaskType::Update, EntityKind::Account)
        );
        match request.payload() {
            TaskPayload::UpdateAccount(patch) => {
                assert_eq!(patch.department, Some(Some("Y".to_string())));
                assert!(patch.role.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn create_rejects_unknown_keys() {
        let result = SubmitRequest::create(
            EntityKind::LookupEntry,
            &map(json!({"data_type": "Country", "code": "US", "value": "USA", "color": "red"})),
        );
        assert_eq!(result, Err(PayloadError::UnknownField("color".to_string())));
    }

    #[test]
    fn empty_bulk_upload_is_rejected() {
        let result = SubmitRequest::bulk_upload(EntityKind::Account, "empty.csv", vec![]);
        assert!(matches!(result, Err(PayloadError::Invalid(_))));
    }

    #[test]
    fn typed_payload_must_match_target() {
        assert!(SubmitRequest::from_payload(None, TaskPayload::DeleteAccount).is_err());
        assert!(SubmitRequest::from_payload(Some(3), TaskPayload::DeleteAccount).is_ok());
    }

    #[test]
    fn unreadable_payload_cannot_be_submitted() {
        let payload = TaskPayload::decode_stored(
            govern_types::TaskType::Update,
            EntityKind::Account,
            r#"{"department":"Y"}"#,
        );
        assert!(matches!(
            SubmitRequest::from_payload(Some(5), payload),
            Err(PayloadError::Undecodable(_))
        ));
    }
}
