use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Supplies the bearer token sent with each backend call.
///
/// How the token is obtained is up to the implementation; `None` means the
/// request goes out unauthenticated.
#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    async fn get_token(&self) -> Option<String>;
}

/// Type alias for Arc-wrapped TokenProvider trait objects
pub type TokenProviderRef = Arc<dyn TokenProvider>;

/// A fixed token, typically read from config or the environment
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn get_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(
            StaticToken::new(Some("abc".to_string())).get_token().await,
            Some("abc".to_string())
        );
        assert_eq!(StaticToken::new(Some("  ".to_string())).get_token().await, None);
        assert_eq!(StaticToken::none().get_token().await, None);
    }
}
