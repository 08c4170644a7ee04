use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(GroupId);
id_newtype!(StudentId);
id_newtype!(TransferRequestId);

pub const DEFAULT_TRANSFER_STATUS: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

/// One optional student column as bound to, or read back from, storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
}

pub trait ColumnType: Clone + Sized {
    const KIND: ColumnKind;

    fn into_column(value: Option<Self>) -> ColumnValue;
    fn from_column(value: ColumnValue) -> Option<Self>;
    fn is_empty_value(&self) -> bool;
}

impl ColumnType for String {
    const KIND: ColumnKind = ColumnKind::Text;

    fn into_column(value: Option<Self>) -> ColumnValue {
        ColumnValue::Text(value)
    }

    fn from_column(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Text(value) => value,
            ColumnValue::Integer(value) => value.map(|v| v.to_string()),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl ColumnType for i64 {
    const KIND: ColumnKind = ColumnKind::Integer;

    fn into_column(value: Option<Self>) -> ColumnValue {
        ColumnValue::Integer(value)
    }

    fn from_column(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Integer(value) => value,
            ColumnValue::Text(value) => value.and_then(|v| v.parse().ok()),
        }
    }

    fn is_empty_value(&self) -> bool {
        false
    }
}

/// Keeps an explicit JSON `null` distinct from an absent key.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! student_details {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Descriptive columns of a student; every one of them is optional.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct StudentDetails {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        /// Changes to the descriptive columns. An absent key leaves the column
        /// untouched, `null` clears it.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct StudentDetailsPatch {
            $(
                #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
                pub $field: Option<Option<$ty>>,
            )*
        }

        impl StudentDetails {
            /// Columns carrying a value that is neither null nor empty text.
            pub fn filled_columns(&self) -> Vec<(&'static str, ColumnValue)> {
                let mut columns = Vec::new();
                $(
                    if let Some(value) = self.$field.as_ref().filter(|v| !v.is_empty_value()) {
                        columns.push((
                            stringify!($field),
                            <$ty as ColumnType>::into_column(Some(value.clone())),
                        ));
                    }
                )*
                columns
            }

            pub fn from_columns<E>(
                mut read: impl FnMut(&'static str, ColumnKind) -> Result<ColumnValue, E>,
            ) -> Result<Self, E> {
                Ok(Self {
                    $(
                        $field: <$ty as ColumnType>::from_column(
                            read(stringify!($field), <$ty as ColumnType>::KIND)?,
                        ),
                    )*
                })
            }
        }

        impl StudentDetailsPatch {
            pub fn assignments(&self) -> Vec<(&'static str, ColumnValue)> {
                let mut columns = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        columns.push((
                            stringify!($field),
                            <$ty as ColumnType>::into_column(value.clone()),
                        ));
                    }
                )*
                columns
            }
        }
    };
}

student_details! {
    class_code: String,
    serial_number: i64,
    class_room: String,
    student_code: String,
    birth_date: String,
    birth_day: i64,
    birth_month: i64,
    birth_year: i64,
    birth_governorate: String,
    gender: String,
    religion: String,
    nationality: String,
    last_certificate: String,
    last_school: String,
    total_score: String,
    guardian_name: String,
    student_address: String,
    stage: String,
    orphan_status: String,
    enrollment_status: String,
    tablet_serial: String,
    imei: String,
    insurance_number: String,
    enrollment_date: String,
    notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub name: String,
    pub national_id: String,
    #[serde(flatten)]
    pub details: StudentDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub id: TransferRequestId,
    pub student_id: StudentId,
    pub from_school: String,
    pub to_school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_reason: Option<String>,
    pub request_date: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_columns_skip_empty_text_and_nulls() {
        let details = StudentDetails {
            class_code: Some("3B".into()),
            gender: Some(String::new()),
            birth_year: Some(2011),
            notes: None,
            ..StudentDetails::default()
        };

        let columns = details.filled_columns();
        assert_eq!(
            columns,
            vec![
                ("class_code", ColumnValue::Text(Some("3B".into()))),
                ("birth_year", ColumnValue::Integer(Some(2011))),
            ]
        );
    }

    #[test]
    fn patch_keeps_explicit_null_apart_from_absent_keys() {
        let patch: StudentDetailsPatch =
            serde_json::from_value(serde_json::json!({ "notes": null, "stage": "2" }))
                .expect("patch");

        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.stage, Some(Some("2".into())));
        assert_eq!(patch.gender, None);
        assert_eq!(
            patch.assignments(),
            vec![
                ("stage", ColumnValue::Text(Some("2".into()))),
                ("notes", ColumnValue::Text(None)),
            ]
        );
    }

    #[test]
    fn student_json_uses_camel_case_and_flattens_details() {
        let student = Student {
            id: StudentId(4),
            group_id: None,
            name: "Mona".into(),
            national_id: "2990".into(),
            details: StudentDetails {
                guardian_name: Some("Adel".into()),
                ..StudentDetails::default()
            },
        };

        let value = serde_json::to_value(&student).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "id": 4,
                "name": "Mona",
                "nationalId": "2990",
                "guardianName": "Adel",
            })
        );
    }
}
