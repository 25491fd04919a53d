use std::collections::HashMap;

use crate::error::MappingError;
use crate::model::issue::IssueType;

pub fn resolve_type(issue_type: &IssueType) -> Result<&'static str, MappingError> {
    match issue_type {
        IssueType::Epic => Ok("Epic"),
        IssueType::Story => Ok("User Story"),
        IssueType::Task | IssueType::SubTask => Ok("Task"),
        IssueType::Bug => Ok("Bug"),
        IssueType::Other(name) => Err(MappingError::UnknownType(name.clone())),
    }
}

pub fn resolve_state(status_id: &str, issue_type: &IssueType) -> Result<&'static str, MappingError> {
    let state = match status_id {
        // Open
        "1" => "New",
        // In Progress
        "3" => "Active",
        // Reopened
        "4" => "Reopened",
        // Resolved
        "5" => "Resolved",
        // Closed
        "6" => "Closed",
        // To Do
        "10000" => "New",
        // Done
        "10001" => match issue_type {
            IssueType::Task | IssueType::SubTask => "Closed",
            _ => "Resolved",
        },
        // In Testing
        "10101" => "In Testing",
        _ => {
            return Err(MappingError::UnknownState {
                status: status_id.to_string(),
                issue_type: issue_type.to_string(),
            })
        }
    };
    Ok(state)
}

pub fn resolve_priority(name: &str) -> u8 {
    match name {
        "Highest" => 1,
        "High" => 2,
        "Medium" => 3,
        _ => 4,
    }
}

/// Source identity to destination identity table.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: HashMap<String, String>,
}

impl IdentityMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// The empty identity always resolves to itself; anything else must be in the table.
    pub fn resolve(&self, identity: &str) -> Result<String, MappingError> {
        if identity.is_empty() {
            return Ok(String::new());
        }
        self.entries
            .get(identity)
            .cloned()
            .ok_or_else(|| MappingError::UnknownUser(identity.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_to_destination_types() {
        assert_eq!(resolve_type(&IssueType::Epic).unwrap(), "Epic");
        assert_eq!(resolve_type(&IssueType::from_name("Story")).unwrap(), "User Story");
        assert_eq!(resolve_type(&IssueType::Task).unwrap(), "Task");
        assert_eq!(resolve_type(&IssueType::from_name("Sub-task")).unwrap(), "Task");
        assert_eq!(resolve_type(&IssueType::Bug).unwrap(), "Bug");
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = resolve_type(&IssueType::from_name("Improvement")).unwrap_err();
        assert_eq!(err, MappingError::UnknownType("Improvement".into()));
    }

    #[test]
    fn status_codes_map_to_states() {
        let cases = [
            ("1", "New"),
            ("3", "Active"),
            ("4", "Reopened"),
            ("5", "Resolved"),
            ("6", "Closed"),
            ("10000", "New"),
            ("10101", "In Testing"),
        ];
        for (code, expected) in cases {
            assert_eq!(resolve_state(code, &IssueType::Bug).unwrap(), expected, "code {code}");
        }
    }

    #[test]
    fn done_depends_on_issue_type() {
        assert_eq!(resolve_state("10001", &IssueType::Task).unwrap(), "Closed");
        assert_eq!(resolve_state("10001", &IssueType::SubTask).unwrap(), "Closed");
        assert_eq!(resolve_state("10001", &IssueType::Story).unwrap(), "Resolved");
        assert_eq!(resolve_state("10001", &IssueType::Bug).unwrap(), "Resolved");
    }

    #[test]
    fn unknown_status_code_is_an_error() {
        let err = resolve_state("999", &IssueType::Task).unwrap_err();
        assert!(matches!(err, MappingError::UnknownState { ref status, .. } if status == "999"));
    }

    #[test]
    fn priority_is_total() {
        assert_eq!(resolve_priority("Highest"), 1);
        assert_eq!(resolve_priority("High"), 2);
        assert_eq!(resolve_priority("Medium"), 3);
        assert_eq!(resolve_priority("Low"), 4);
        assert_eq!(resolve_priority("Lowest"), 4);
        assert_eq!(resolve_priority(""), 4);
        assert_eq!(resolve_priority("Blocker"), 4);
    }

    #[test]
    fn empty_identity_resolves_without_a_table() {
        let map = IdentityMap::default();
        assert_eq!(map.resolve("").unwrap(), "");
    }

    #[test]
    fn unmapped_identity_is_an_error() {
        let map = IdentityMap::default();
        assert_eq!(
            map.resolve("jdoe@example.com").unwrap_err(),
            MappingError::UnknownUser("jdoe@example.com".into())
        );
    }

    #[test]
    fn mapped_identity_is_translated() {
        let map = IdentityMap::new(HashMap::from([(
            "jdoe@example.com".to_string(),
            "John Doe <john.doe@corp.example>".to_string(),
        )]));
        assert_eq!(
            map.resolve("jdoe@example.com").unwrap(),
            "John Doe <john.doe@corp.example>"
        );
    }
}
