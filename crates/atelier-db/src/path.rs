use std::fmt;

/// Data root of the current app generation.
pub const DEFAULT_DATA_ROOT: &str = "v0_1_0";

/// Slash-separated address of a node in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// Parses `a/b/c`. Empty segments (leading, trailing or doubled slashes)
    /// are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Where each entity lives in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    data_root: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}

impl Schema {
    pub fn new(data_root: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> TreePath {
        TreePath::parse(&self.data_root)
    }

    // -- Users --

    pub fn users(&self) -> TreePath {
        self.data_root().child("users")
    }

    pub fn user(&self, user_id: &str) -> TreePath {
        self.users().child(user_id)
    }

    pub fn user_connected_token(&self, user_id: &str, token: &str) -> TreePath {
        self.user(user_id).child("tokens").child("connected").child(token)
    }

    pub fn user_connected_tokens(&self, user_id: &str) -> TreePath {
        self.user(user_id).child("tokens").child("connected")
    }

    pub fn user_extended_permission(&self, user_id: &str, teacher_id: &str) -> TreePath {
        self.user(user_id)
            .child("tokens")
            .child("userWithExtendedPermissions")
            .child(teacher_id)
    }

    pub fn push_tokens(&self, user_id: &str) -> TreePath {
        self.user(user_id).child("pushNotificationsTokens")
    }

    // -- Tokens --

    pub fn tokens(&self) -> TreePath {
        self.data_root().child("tokens")
    }

    pub fn token(&self, token: &str) -> TreePath {
        self.tokens().child(token)
    }

    pub fn token_creator(&self, token: &str) -> TreePath {
        self.token(token).child("metadata").child("createdBy")
    }

    pub fn token_connected_users(&self, token: &str) -> TreePath {
        self.token(token).child("connectedUsers")
    }

    pub fn token_connected_user(&self, token: &str, user_id: &str) -> TreePath {
        self.token_connected_users(token).child(user_id)
    }

    pub fn existing_token(&self, token: &str) -> TreePath {
        self.tokens().child("existing").child(token)
    }

    // -- Questions --

    pub fn questions(&self, teacher_id: &str) -> TreePath {
        self.data_root().child("questions").child(teacher_id)
    }

    pub fn question(&self, teacher_id: &str, question_id: &str) -> TreePath {
        self.questions(teacher_id).child(question_id)
    }

    // -- Answers --

    pub fn student_answers(&self, token: &str, student_id: &str) -> TreePath {
        self.data_root().child("answers").child(token).child(student_id)
    }

    pub fn answer(&self, token: &str, student_id: &str, question_id: &str) -> TreePath {
        self.student_answers(token, student_id).child(question_id)
    }

    // -- App info (outside the data root) --

    pub fn required_version(&self) -> TreePath {
        TreePath::parse("appInfo/requiredVersion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_segments() {
        let path = TreePath::parse("/v0_1_0//users/u1/");
        assert_eq!(path.segments(), ["v0_1_0", "users", "u1"]);
        assert_eq!(path.to_string(), "/v0_1_0/users/u1");
    }

    #[test]
    fn schema_paths_live_under_data_root() {
        let schema = Schema::default();
        let path = schema.user_extended_permission("s1", "t1");
        assert_eq!(
            path.to_string(),
            "/v0_1_0/users/s1/tokens/userWithExtendedPermissions/t1"
        );
        assert!(path.starts_with(&schema.data_root()));
        assert!(!schema.required_version().starts_with(&schema.data_root()));
    }

    #[test]
    fn existing_token_mirror_sits_beside_tokens() {
        let schema = Schema::new("v2");
        assert_eq!(schema.existing_token("abc").to_string(), "/v2/tokens/existing/abc");
        assert_eq!(schema.token_creator("abc").to_string(), "/v2/tokens/abc/metadata/createdBy");
    }
}
