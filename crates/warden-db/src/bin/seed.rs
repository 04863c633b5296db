//! # Demo Organization Seeder
//!
//! Populates a database with one demo organization and prints which projects
//! each kind of access client can see.
//!
//! ## Usage
//! ```bash
//! # Seed ./warden_dev.db
//! cargo run -p warden-db --bin seed
//!
//! # Specify database path or config file
//! cargo run -p warden-db --bin seed -- --db ./data/warden.db
//! cargo run -p warden-db --bin seed -- --config ./warden.toml
//!
//! # Emit the listings as JSON
//! cargo run -p warden-db --bin seed -- --json
//! ```
//!
//! ## Generated Organization
//! ```text
//! alice ── member of "platform" ──► read/write  infra, payments
//! bob   ── direct policy        ──► read        payments
//! deployer (service account)    ──► read        infra
//! archive (soft-deleted)            granted to "platform", never listed
//! ```

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use warden_core::{AccessClientKind, AccessPolicy, Grantee, NewProject, NewSecret, Project};
use warden_db::{Database, DbError, ProjectStore, SecretStore, WardenConfig};

/// One listing as printed in `--json` mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing {
    principal: String,
    kind: AccessClientKind,
    projects: Vec<String>,
}

struct Args {
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    json: bool,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        db: None,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    parsed.db = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--json" => parsed.json = true,
            "--help" | "-h" => {
                println!("Warden Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("      --json           Print listings as JSON");
                println!("  -h, --help           Show this help message");
                return None;
            }
            _ => {}
        }
        i += 1;
    }

    Some(parsed)
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = parse_args() else {
        return Ok(());
    };

    let mut config = WardenConfig::load(args.config)?;
    if let Some(db) = args.db {
        config.database.path = db;
    } else if config.database.path == PathBuf::from("warden.db") {
        config.database.path = PathBuf::from("./warden_dev.db");
    }

    init_tracing(&config.logging.filter);

    let db = Database::new(config.db_config()).await?;
    info!(path = %config.database.path.display(), "Database ready");

    let demo = seed(&db).await?;

    let listings = vec![
        list(&db, &demo, "admin", Uuid::nil(), AccessClientKind::NoAccessCheck).await?,
        list(&db, &demo, "alice", demo.alice, AccessClientKind::User).await?,
        list(&db, &demo, "bob", demo.bob, AccessClientKind::User).await?,
        list(&db, &demo, "deployer", demo.deployer, AccessClientKind::ServiceAccount).await?,
    ];

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    println!("Warden Demo Seeder");
    println!("==================");
    println!("Database:     {}", config.database.path.display());
    println!("Organization: {}", demo.organization);
    println!();
    for listing in &listings {
        println!(
            "  {:<10} ({:<15}) → {}",
            listing.principal,
            listing.kind.to_string(),
            if listing.projects.is_empty() {
                "(nothing)".to_string()
            } else {
                listing.projects.join(", ")
            }
        );
    }

    let infra_secrets = db.secrets().list_by_project(demo.infra.id).await?;
    println!();
    println!("Secrets in infra: {}", infra_secrets.len());
    println!("✓ Seed complete!");

    Ok(())
}

struct Demo {
    organization: Uuid,
    alice: Uuid,
    bob: Uuid,
    deployer: Uuid,
    infra: Project,
}

async fn seed(db: &Database) -> Result<Demo, DbError> {
    let organization = Uuid::new_v4();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let members = db.memberships();
    let alice_ou = members.add_organization_user(organization, alice).await?;
    let bob_ou = members.add_organization_user(organization, bob).await?;
    let platform = members.add_group(organization, "platform").await?;
    members.add_group_member(platform.id, alice_ou.id).await?;
    let deployer = members.add_service_account(organization, "deployer").await?;

    let projects = db.projects();
    let mut created = Vec::new();
    for name in ["infra", "payments", "archive"] {
        created.push(
            projects
                .create(&NewProject {
                    organization_id: organization,
                    name: name.to_string(),
                })
                .await?,
        );
    }
    let (infra, payments, archive) = (&created[0], &created[1], &created[2]);

    let platform_grantee = Grantee::Group {
        group_id: platform.id,
    };
    db.access_policies()
        .create_many(&[
            AccessPolicy::new(platform_grantee, infra.id, true, true),
            AccessPolicy::new(platform_grantee, payments.id, true, true),
            AccessPolicy::new(platform_grantee, archive.id, true, true),
            AccessPolicy::new(
                Grantee::User {
                    organization_user_id: bob_ou.id,
                },
                payments.id,
                true,
                false,
            ),
            AccessPolicy::new(
                Grantee::ServiceAccount {
                    service_account_id: deployer.id,
                },
                infra.id,
                true,
                false,
            ),
        ])
        .await?;

    // Projects have no soft-delete operation of their own; mark it directly.
    sqlx::query("UPDATE project SET deleted_date = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(archive.id.to_string())
        .execute(db.pool())
        .await?;

    let secrets = db.secrets();
    for (key, value) in [("DATABASE_URL", "postgres://infra"), ("TLS_KEY", "-----BEGIN")] {
        secrets
            .create(&NewSecret {
                organization_id: organization,
                project_id: Some(infra.id),
                key: key.to_string(),
                value: value.to_string(),
                note: None,
            })
            .await?;
    }

    info!(organization = %organization, "Demo organization seeded");

    Ok(Demo {
        organization,
        alice,
        bob,
        deployer: deployer.id,
        infra: infra.clone(),
    })
}

async fn list(
    db: &Database,
    demo: &Demo,
    principal: &str,
    principal_id: Uuid,
    kind: AccessClientKind,
) -> Result<Listing, DbError> {
    let projects = db
        .projects()
        .list_by_organization(demo.organization, principal_id, kind)
        .await?;

    Ok(Listing {
        principal: principal.to_string(),
        kind,
        projects: projects.into_iter().map(|p| p.name).collect(),
    })
}
