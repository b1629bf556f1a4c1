//! pets-gateway: entry point.
//!
//! Runs one edge operation against the running services and prints the
//! JSON projection of the outcome on stdout.  Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! pets-gateway [OPTIONS] <COMMAND>
//!
//! Options:
//!   --broker-addr <ADDR>     Broker daemon address [default: 127.0.0.1:5679]
//!   --rpc-timeout-ms <MS>    Reply timeout per call [default: 5000]
//!   --user <NAME>            Acting user [default: admin]
//!   --owner-id <UUID>        Act as a USER bound to this owner instead of
//!                            as the administrator
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Default          |
//! |-----------------------|------------------|
//! | `PETS_BROKER_ADDR`    | `127.0.0.1:5679` |
//! | `PETS_RPC_TIMEOUT_MS` | `5000`           |
//!
//! # Example
//!
//! ```text
//! pets-gateway create-owner --first-name Ann --last-name Lee --birth-date 1980-04-01
//! pets-gateway --user ann --owner-id <OWNER> make-friends <CAT1> <CAT2>
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pets_broker::RemoteBroker;
use pets_core::{
    Broker, CatDto, Color, CreateCatRequest, CreateOwnerRequest, OwnerDto, PageRequest,
    RpcClient, SortDirection,
};
use pets_gateway::application::user_directory::DEFAULT_ADMIN;
use pets_gateway::domain::config::DEFAULT_BROKER_ADDR;
use pets_gateway::domain::GatewayConfig;
use pets_gateway::{EdgeResponse, GatewayService, Role, User, UserDirectory};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "pets-gateway",
    about = "Edge front-end for the owners and cats services",
    version
)]
struct Cli {
    /// Address of the broker daemon.
    #[arg(long, default_value = DEFAULT_BROKER_ADDR, env = "PETS_BROKER_ADDR")]
    broker_addr: SocketAddr,

    /// How long each call waits for its reply.
    #[arg(long, default_value_t = 5000, env = "PETS_RPC_TIMEOUT_MS")]
    rpc_timeout_ms: u64,

    /// Username the operation runs as.
    #[arg(long, default_value = DEFAULT_ADMIN)]
    user: String,

    /// Bind `--user` to this owner as a regular USER.
    #[arg(long)]
    owner_id: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Args)]
struct PageArgs {
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    size: u32,
    #[arg(long, default_value = "id")]
    sort_by: String,
    /// `asc` or `desc`.
    #[arg(long, default_value = "asc")]
    sort_dir: String,
}

impl PageArgs {
    fn to_request(&self) -> PageRequest {
        let dir = if self.sort_dir.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        PageRequest::new(self.page, self.size).sorted_by(self.sort_by.clone(), dir)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    CreateOwner {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        birth_date: NaiveDate,
    },
    GetOwner {
        id: Uuid,
    },
    ListOwners(PageArgs),
    UpdateOwner {
        id: Uuid,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        birth_date: NaiveDate,
    },
    DeleteOwner {
        id: Uuid,
    },
    /// Move a pet to another owner.
    ChangeOwner {
        owner_id: Uuid,
        pet_id: Uuid,
    },
    DeletePet {
        owner_id: Uuid,
        pet_id: Uuid,
    },
    CreateCat {
        #[arg(long)]
        name: String,
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        breed: String,
        #[arg(long)]
        color: Color,
        #[arg(long)]
        owner_id: Uuid,
    },
    GetCat {
        id: Uuid,
    },
    ListCats(PageArgs),
    /// Replace a cat's fields; `--friend` lists the complete desired friend set.
    UpdateCat {
        id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        breed: String,
        #[arg(long)]
        color: Color,
        #[arg(long)]
        owner_id: Uuid,
        #[arg(long = "friend")]
        friends: Vec<Uuid>,
    },
    DeleteCat {
        id: Uuid,
    },
    MakeFriends {
        id1: Uuid,
        id2: Uuid,
    },
    DeleteFriendship {
        id1: Uuid,
        id2: Uuid,
    },
    /// Register a user for an existing owner.
    CreateUser {
        username: String,
        owner_id: Uuid,
        #[arg(long)]
        admin: bool,
    },
}

impl Cli {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            broker_addr: self.broker_addr,
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
        }
    }

    /// The directory for this run and the user the command acts as.
    fn acting_user(&self) -> (UserDirectory, User) {
        let users = UserDirectory::with_admin(DEFAULT_ADMIN);
        let user = match self.owner_id {
            Some(owner_id) => {
                let user = User::new(self.user.clone(), Role::User, owner_id);
                users.insert(user.clone());
                user
            }
            None => User::new(self.user.clone(), Role::Admin, Uuid::new_v4()),
        };
        (users, user)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.gateway_config();
    let (users, user) = cli.acting_user();
    debug!(user = %user.username, role = ?user.role, "acting user");

    let broker: Arc<dyn Broker> = Arc::new(
        RemoteBroker::connect(config.broker_addr)
            .await
            .with_context(|| format!("failed to connect to broker at {}", config.broker_addr))?,
    );
    let rpc = Arc::new(RpcClient::new(broker, config.rpc_config()));
    let gateway = GatewayService::new(rpc, Arc::new(users));

    run(&gateway, &user, cli.command).await
}

async fn run(gateway: &GatewayService, user: &User, command: Command) -> anyhow::Result<()> {
    match command {
        Command::CreateOwner {
            first_name,
            last_name,
            birth_date,
        } => {
            let request = CreateOwnerRequest {
                first_name,
                last_name,
                date_of_birth: birth_date,
            };
            print(gateway.create_owner(request).await?)
        }
        Command::GetOwner { id } => print(gateway.get_owner(id).await?),
        Command::ListOwners(args) => print(gateway.get_all_owners(&args.to_request()).await?),
        Command::UpdateOwner {
            id,
            first_name,
            last_name,
            birth_date,
        } => {
            let dto = OwnerDto {
                id,
                first_name,
                last_name,
                birth_date,
            };
            print(gateway.update_owner(user, dto).await?)
        }
        Command::DeleteOwner { id } => print(gateway.delete_owner(user, id).await?),
        Command::ChangeOwner { owner_id, pet_id } => {
            print(gateway.change_owner_for_pet(user, owner_id, pet_id).await?)
        }
        Command::DeletePet { owner_id, pet_id } => {
            print(gateway.delete_pet(user, owner_id, pet_id).await?)
        }
        Command::CreateCat {
            name,
            birth_date,
            breed,
            color,
            owner_id,
        } => {
            let request = CreateCatRequest {
                name,
                date_of_birth: birth_date,
                breed,
                color,
                owner_id,
            };
            print(gateway.create_cat(user, request).await?)
        }
        Command::GetCat { id } => print(gateway.get_cat(id).await?),
        Command::ListCats(args) => print(gateway.get_all_cats(&args.to_request()).await?),
        Command::UpdateCat {
            id,
            name,
            birth_date,
            breed,
            color,
            owner_id,
            friends,
        } => {
            let dto = CatDto {
                id,
                name,
                date_of_birth: birth_date,
                breed,
                color,
                owner_id,
                friends,
            };
            print(gateway.update_cat(user, dto).await?)
        }
        Command::DeleteCat { id } => print(gateway.delete_cat(user, id).await?),
        Command::MakeFriends { id1, id2 } => print(gateway.make_friends(user, id1, id2).await?),
        Command::DeleteFriendship { id1, id2 } => {
            print(gateway.delete_friendship(user, id1, id2).await?)
        }
        Command::CreateUser {
            username,
            owner_id,
            admin,
        } => {
            let role = if admin { Role::Admin } else { Role::User };
            print(gateway.create_user(Some(user), &username, role, owner_id).await?)
        }
    }
}

fn print<T: Serialize>(response: EdgeResponse<T>) -> anyhow::Result<()> {
    let value = response.to_json().context("failed to render response")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
