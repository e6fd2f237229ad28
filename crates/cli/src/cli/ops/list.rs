use clap::Args;

use common::secret::{FsSecretStoreError, Secret, SecretStore, SecretStoreError};
use secm_cli::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct List {
    /// Only show secrets carrying all of these tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Only show secrets whose description contains this text
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Secret store error: {0}")]
    Store(#[from] SecretStoreError<FsSecretStoreError>),
}

impl List {
    fn matches(&self, secret: &Secret) -> bool {
        let tagged = self
            .tags
            .iter()
            .all(|tag| secret.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim())));
        let described = match &self.description {
            Some(text) => secret
                .description
                .to_lowercase()
                .contains(&text.to_lowercase()),
            None => true,
        };
        tagged && described
    }
}

fn table(rows: &[(String, Secret)]) -> String {
    let name_width = rows
        .iter()
        .map(|(_, s)| s.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let type_width = rows
        .iter()
        .map(|(_, s)| s.kind.chars().count())
        .max()
        .unwrap_or(0)
        .max("TYPE".len());

    let mut lines = vec![format!(
        "{:<64}  {:<name_width$}  {:<type_width$}  {:<20}  TAGS",
        "ID", "NAME", "TYPE", "CREATED"
    )];
    for (id, secret) in rows {
        lines.push(format!(
            "{:<64}  {:<name_width$}  {:<type_width$}  {:<20}  {}",
            id,
            secret.name,
            secret.kind,
            secret.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            secret.tags.join(",")
        ));
    }
    lines.join("\n")
}

#[async_trait::async_trait]
impl crate::cli::op::Op for List {
    type Error = ListError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = ctx.state()?.secret_store().await?;
        let rows: Vec<_> = store
            .list()
            .await?
            .into_iter()
            .filter(|(_, secret)| self.matches(secret))
            .collect();

        if rows.is_empty() {
            return Ok("No secrets found".to_string());
        }
        Ok(table(&rows))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::crypto::{Curve, Identity, KeyType};

    fn secret(description: &str, tags: &[&str]) -> Secret {
        let identity = Identity::generate(KeyType::Ec(Curve::X25519)).unwrap();
        let mut secret = Secret::seal("s", &identity.public_key(), b"x").unwrap();
        secret.description = description.to_string();
        secret.tags = tags.iter().map(|t| t.to_string()).collect();
        secret
    }

    #[test]
    fn test_filters() {
        let filter = List {
            tags: vec!["prod".to_string(), "db".to_string()],
            description: Some("Postgres".to_string()),
        };
        assert!(filter.matches(&secret("main postgres password", &["db", "prod", "eu"])));
        assert!(!filter.matches(&secret("main postgres password", &["db"])));
        assert!(!filter.matches(&secret("redis", &["db", "prod"])));

        let everything = List {
            tags: vec![],
            description: None,
        };
        assert!(everything.matches(&secret("", &[])));
    }

    #[test]
    fn test_table_has_a_row_per_secret() {
        let rows = vec![
            ("a".repeat(64), secret("", &["x"])),
            ("b".repeat(64), secret("", &[])),
        ];
        let text = table(&rows);
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("ID"));
    }
}
