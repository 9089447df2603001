//! ---
//! fleet_section: "05-networking-external-interfaces"
//! fleet_subsection: "binary"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Control CLI for administrators managing robot lifecycles."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{Args, Subcommand};
use robofleet_common::{Actor, ActorId, AppConfig, RequestContext, RobotId, TeamId};
use robofleet_core::LifecycleError;
use robofleet_store::Page;
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::wiring::Services;

/// Robot lifecycle commands.
#[derive(Debug, Subcommand)]
pub enum RobotsCommand {
    /// List the team's robots, newest first.
    List(TeamArgs),
    /// Show one robot's detail snapshot.
    Show(RobotArgs),
    /// Print one robot's current lifecycle status.
    Status(RobotArgs),
    /// List the groups a robot belongs to.
    Groups(RobotArgs),
    /// Page through a robot's rollout participations.
    Rollouts(RolloutArgs),
    /// Delete a robot, tear down its ECU keys and revoke its active certificate.
    Delete(RobotArgs),
}

#[derive(Debug, Args)]
pub struct TeamArgs {
    #[arg(long, value_name = "TEAM")]
    pub team: String,
    /// Acting user; defaults to the CLI's system identity.
    #[arg(long, value_name = "ACTOR")]
    pub actor: Option<String>,
}

#[derive(Debug, Args)]
pub struct RobotArgs {
    #[command(flatten)]
    pub scope: TeamArgs,
    #[arg(long, value_name = "ROBOT")]
    pub robot: String,
}

#[derive(Debug, Args)]
pub struct RolloutArgs {
    #[command(flatten)]
    pub target: RobotArgs,
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
    #[arg(long)]
    pub take: Option<usize>,
}

impl RobotsCommand {
    fn scope(&self) -> &TeamArgs {
        match self {
            RobotsCommand::List(scope) => scope,
            RobotsCommand::Show(args)
            | RobotsCommand::Status(args)
            | RobotsCommand::Groups(args)
            | RobotsCommand::Delete(args) => &args.scope,
            RobotsCommand::Rollouts(args) => &args.target.scope,
        }
    }
}

/// Execute the supplied robots command.
pub fn run(command: RobotsCommand, config: &AppConfig) -> Result<()> {
    let ctx = request_context(command.scope(), config)?;
    let services = Services::open(config)?;
    let runtime = Runtime::new()?;

    match &command {
        RobotsCommand::List(_) => {
            let robots = runtime.block_on(services.listings.list_robots(&ctx))?;
            print_json(&robots)
        }
        RobotsCommand::Show(args) => {
            let robot_id = robot_id(&args.robot)?;
            let detail = runtime.block_on(services.details.robot_detail(&ctx, &robot_id))?;
            print_json(&detail)
        }
        RobotsCommand::Status(args) => {
            let robot_id = robot_id(&args.robot)?;
            let status = runtime.block_on(services.details.robot_status(&ctx, &robot_id))?;
            print_json(&serde_json::json!({ "id": robot_id, "status": status }))
        }
        RobotsCommand::Groups(args) => {
            let robot_id = robot_id(&args.robot)?;
            let groups =
                runtime.block_on(services.listings.list_robot_groups(&ctx, &robot_id))?;
            print_json(&groups)
        }
        RobotsCommand::Rollouts(args) => {
            let robot_id = robot_id(&args.target.robot)?;
            let page = Page {
                skip: args.skip,
                take: args.take,
            };
            let rollouts =
                runtime.block_on(services.listings.list_robot_rollouts(&ctx, &robot_id, page))?;
            print_json(&rollouts)
        }
        RobotsCommand::Delete(args) => {
            let robot_id = robot_id(&args.robot)?;
            let mut events = services.events.subscribe();
            let outcome = runtime.block_on(services.orchestrator.delete_robot(&ctx, &robot_id));

            // The row is gone once the orchestrator gets past the relational delete,
            // whether or not cleanup held.
            if matches!(&outcome, Ok(_) | Err(LifecycleError::PartialCleanup(_))) {
                services.save(&config.store.snapshot_path)?;
            }
            while let Ok(event) = events.try_recv() {
                info!(
                    event_id = %event.event_id(),
                    action = ?event.action(),
                    "audit event published"
                );
            }
            let families = services.registry.gather();
            if let Ok(text) = prometheus::TextEncoder::new().encode_to_string(&families) {
                debug!(metrics = %text, "lifecycle metrics");
            }

            match outcome {
                Ok(report) => print_json(&report),
                Err(LifecycleError::PartialCleanup(failure)) => {
                    print_json(&failure)?;
                    Err(LifecycleError::PartialCleanup(failure).into())
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

fn request_context(scope: &TeamArgs, config: &AppConfig) -> Result<RequestContext> {
    let team_id = TeamId::parse(scope.team.as_str()).map_err(LifecycleError::from)?;
    let actor = match &scope.actor {
        Some(actor) => {
            Actor::user(ActorId::parse(actor.as_str()).map_err(LifecycleError::from)?)
        }
        None => Actor::system(ActorId::parse("robofleetctl").map_err(LifecycleError::from)?),
    };
    let ctx = RequestContext::new(actor, team_id);
    Ok(match config.lifecycle.request_timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    })
}

fn robot_id(raw: &str) -> Result<RobotId> {
    Ok(RobotId::parse(raw).map_err(LifecycleError::from)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
