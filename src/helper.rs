use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::args::{ItemAction, ItemArgs};
use crate::client::{StoreClient, StoreError};
use crate::config::ConfigError;
use crate::expression::Record;

/// Item actions need an id; table provisioning does not.
pub fn validate(args: &ItemArgs) -> Result<(), ConfigError> {
    let needs_id = args.action != ItemAction::CreateTable;
    let missing_id = args.id.as_deref().map_or(true, str::is_empty);
    if args.table.is_empty() || (needs_id && missing_id) {
        return Err(ConfigError::MissingTarget);
    }
    Ok(())
}

pub async fn run<C: StoreClient>(client: &C, args: &ItemArgs) -> Result<()> {
    let table = args.table.as_str();
    let id = args.id.as_deref().unwrap_or_default();
    match args.action {
        ItemAction::CreateTable => {
            client.create_table(table).await?;
            info!("Created table {}", table);
        }
        ItemAction::CreateItem => {
            client.put(table, &Record::new(id, args.age)).await?;
            info!("Created item {} with age {}", id, args.age);
        }
        ItemAction::DeleteItem => {
            client.delete(table, id).await?;
            info!("Deleted item {}", id);
        }
        ItemAction::GetItem => {
            let record = client.read(table, id).await?;
            println!(
                "Found item: id={}, age={}, version={}",
                record.id, record.age, record.version
            );
        }
    }
    Ok(())
}

/// Makes sure `table` exists and (re)writes the record with `age` and version 0.
pub async fn seed<C: StoreClient>(client: &C, table: &str, id: &str, age: i64) -> Result<()> {
    match client.create_table(table).await {
        Ok(()) | Err(StoreError::TableExists(_)) => {}
        Err(e) => return Err(e).context("creating table"),
    }
    client
        .put(table, &Record::new(id, age))
        .await
        .with_context(|| format!("seeding {}/{}", table, id))?;
    debug!("Seeded {}/{} with age {}", table, id, age);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::args::{Args, Command};
    use crate::memory::MemoryClient;

    fn item_args(argv: &[&str]) -> ItemArgs {
        let mut full = vec!["contendkv", "item"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            Command::Item(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn id_is_required_for_item_actions() {
        assert!(validate(&item_args(&["--table", "t"])).is_ok());
        assert_eq!(
            validate(&item_args(&["-a", "get-item", "--table", "t"])).unwrap_err(),
            ConfigError::MissingTarget
        );
        assert!(validate(&item_args(&["-a", "delete-item", "--table", "t", "--id", "x"])).is_ok());
    }

    #[tokio::test]
    async fn provision_then_manage_an_item() {
        let client = MemoryClient::new();
        run(&client, &item_args(&["--table", "t"])).await.unwrap();
        run(
            &client,
            &item_args(&["-a", "create-item", "--table", "t", "--id", "x", "--age", "55"]),
        )
        .await
        .unwrap();
        assert_eq!(client.read("t", "x").await.unwrap(), Record::new("x", 55));

        run(&client, &item_args(&["-a", "get-item", "--table", "t", "--id", "x"]))
            .await
            .unwrap();
        run(&client, &item_args(&["-a", "delete-item", "--table", "t", "--id", "x"]))
            .await
            .unwrap();
        assert!(run(&client, &item_args(&["-a", "get-item", "--table", "t", "--id", "x"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn seeding_is_repeatable() {
        let client = MemoryClient::new();
        seed(&client, "t", "x", 5).await.unwrap();
        client
            .conditional_update("t", "x", &crate::expression::Update::decrement_with_version(), None)
            .await
            .unwrap();
        seed(&client, "t", "x", 5).await.unwrap();
        assert_eq!(client.read("t", "x").await.unwrap(), Record::new("x", 5));
    }
}
