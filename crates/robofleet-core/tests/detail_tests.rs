//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
mod support;

use std::sync::Arc;

use robofleet_common::LifecycleConfig;
use robofleet_core::{DetailAggregator, RobotListings, MAX_ROLLOUT_PAGE};
use robofleet_store::{
    Group, GroupMembership, Image, ImageFormat, InMemoryEntityStore, Manifest, NetworkReport,
    Page, Rollout, RolloutAssociation, RolloutRobotStatus, RolloutStatus,
};

use support::{certificate, ctx, ecu, robot, robot_id, team, ts};

fn manifest(team_id: &str, robot: &str, n: i64) -> Manifest {
    Manifest {
        team_id: team(team_id),
        robot_id: robot_id(robot),
        id: format!("{team_id}-{robot}-manifest-{n}"),
        valid: n % 2 == 0,
        created_at: ts(n),
    }
}

fn report(team_id: &str, robot: &str, host: &str, minutes: i64) -> NetworkReport {
    NetworkReport {
        team_id: team(team_id),
        robot_id: robot_id(robot),
        id: format!("{team_id}-{robot}-{host}"),
        hostname: Some(host.into()),
        local_ipv4: Some("10.0.0.7".into()),
        mac: None,
        created_at: ts(minutes),
    }
}

fn rollout(team_id: &str, id: &str) -> Rollout {
    Rollout {
        team_id: team(team_id),
        id: id.into(),
        name: format!("campaign {id}"),
        status: RolloutStatus::Launched,
        created_at: ts(0),
    }
}

fn association(
    team_id: &str,
    robot: &str,
    rollout_id: &str,
    status: RolloutRobotStatus,
    minutes: i64,
) -> RolloutAssociation {
    RolloutAssociation {
        team_id: team(team_id),
        id: format!("{robot}-{rollout_id}"),
        robot_id: robot_id(robot),
        rollout_id: rollout_id.into(),
        status,
        created_at: ts(minutes),
    }
}

/// Two teams each own a robot called `r1`; team t1 also owns `r2`. Every child row
/// carries its owner in its id so leakage is visible.
fn fleet() -> Arc<InMemoryEntityStore> {
    let store = InMemoryEntityStore::new();
    for (team_id, offset) in [("t1", 0), ("t2", 1)] {
        store.insert_robot(robot(team_id, "r1", offset)).unwrap();
        store
            .insert_image(Image {
                team_id: team(team_id),
                id: "img".into(),
                name: format!("{team_id}-image"),
                format: ImageFormat::Ostree,
                size: 4096,
                created_at: ts(0),
            })
            .unwrap();
        let mut primary = ecu(team_id, "r1", "ecu-a", 0);
        primary.installed_image_id = Some("img".into());
        store.insert_ecu(primary).unwrap();
        store
            .insert_certificate(certificate(team_id, "r1", &format!("{team_id}-r1-serial"), 0))
            .unwrap();
        store
            .insert_group(Group {
                team_id: team(team_id),
                id: "g1".into(),
                name: format!("{team_id}-group"),
                created_at: ts(0),
            })
            .unwrap();
        store
            .add_group_membership(GroupMembership {
                team_id: team(team_id),
                group_id: "g1".into(),
                robot_id: robot_id("r1"),
                created_at: ts(3),
            })
            .unwrap();
        store.insert_rollout(rollout(team_id, "ro-1")).unwrap();
        store
            .insert_network_report(report(team_id, "r1", &format!("{team_id}-old"), 1))
            .unwrap();
        store
            .insert_network_report(report(team_id, "r1", &format!("{team_id}-new"), 9))
            .unwrap();
        for n in 0..15 {
            store.insert_manifest(manifest(team_id, "r1", n)).unwrap();
        }
    }
    store
        .insert_rollout_association(association(
            "t2",
            "r1",
            "ro-1",
            RolloutRobotStatus::Failed,
            5,
        ))
        .unwrap();

    store.insert_robot(robot("t1", "r2", 10)).unwrap();
    store.insert_ecu(ecu("t1", "r2", "ecu-b", 1)).unwrap();
    store
        .insert_certificate(certificate("t1", "r2", "t1-r2-serial", 2))
        .unwrap();
    store.insert_manifest(manifest("t1", "r2", 40)).unwrap();
    store.insert_rollout(rollout("t1", "ro-2")).unwrap();
    store
        .insert_rollout_association(association(
            "t1",
            "r2",
            "ro-1",
            RolloutRobotStatus::Successful,
            1,
        ))
        .unwrap();
    store
        .insert_rollout_association(association(
            "t1",
            "r2",
            "ro-2",
            RolloutRobotStatus::Scheduled,
            8,
        ))
        .unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn detail_only_contains_the_robots_own_records() {
    let store = fleet();
    let aggregator = DetailAggregator::new(store, &LifecycleConfig::default());

    let detail = aggregator
        .robot_detail(&ctx("t1"), &robot_id("r1"))
        .await
        .unwrap();

    assert_eq!(detail.id, robot_id("r1"));
    assert_eq!(detail.name, "r1");
    assert_eq!(detail.ecus.len(), 1);
    assert_eq!(detail.ecus[0].id.as_str(), "ecu-a");
    let image = detail.ecus[0].installed_image.as_ref().unwrap();
    assert_eq!(image.name, "t1-image");
    assert_eq!(detail.groups.len(), 1);
    assert_eq!(detail.groups[0].name, "t1-group");
    assert_eq!(detail.certificates.len(), 1);
    assert_eq!(detail.certificates[0].serial, "t1-r1-serial");
    assert!(detail
        .robot_manifests
        .iter()
        .all(|manifest| manifest.id.starts_with("t1-r1-")));
    let network = detail.latest_network_report.as_ref().unwrap();
    assert_eq!(network.hostname.as_deref(), Some("t1-new"));
    // the failed association belongs to t2's r1
    assert_eq!(detail.status, RolloutRobotStatus::Successful);
}

#[tokio::test]
async fn manifests_are_capped_and_newest_first() {
    let store = fleet();
    let aggregator = DetailAggregator::new(store.clone(), &LifecycleConfig::default());
    let detail = aggregator
        .robot_detail(&ctx("t2"), &robot_id("r1"))
        .await
        .unwrap();
    assert_eq!(detail.robot_manifests.len(), 10);
    assert_eq!(detail.robot_manifests[0].id, "t2-r1-manifest-14");
    assert!(detail
        .robot_manifests
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(detail.status, RolloutRobotStatus::Failed);

    let config = LifecycleConfig {
        manifest_history_limit: 3,
        ..LifecycleConfig::default()
    };
    let narrow = DetailAggregator::new(store, &config)
        .robot_detail(&ctx("t2"), &robot_id("r1"))
        .await
        .unwrap();
    assert_eq!(narrow.robot_manifests.len(), 3);
}

#[tokio::test]
async fn detail_for_other_team_is_not_found() {
    let aggregator = DetailAggregator::new(fleet(), &LifecycleConfig::default());
    let err = aggregator
        .robot_detail(&ctx("t2"), &robot_id("r2"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = aggregator
        .robot_status(&ctx("t3"), &robot_id("r1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn status_follows_latest_association() {
    let aggregator = DetailAggregator::new(fleet(), &LifecycleConfig::default());
    assert_eq!(
        aggregator
            .robot_status(&ctx("t1"), &robot_id("r2"))
            .await
            .unwrap(),
        RolloutRobotStatus::Scheduled
    );
    assert_eq!(
        aggregator
            .robot_status(&ctx("t1"), &robot_id("r1"))
            .await
            .unwrap(),
        RolloutRobotStatus::Successful
    );
}

#[tokio::test]
async fn list_robots_is_team_scoped_and_newest_first() {
    let listings = RobotListings::new(fleet());
    let robots = listings.list_robots(&ctx("t1")).await.unwrap();
    let ids: Vec<&str> = robots.iter().map(|robot| robot.id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r1"]);
    assert_eq!(robots[0].status, RolloutRobotStatus::Scheduled);
    assert_eq!(robots[0].group_count, 0);
    assert_eq!(robots[1].status, RolloutRobotStatus::Successful);
    assert_eq!(robots[1].group_count, 1);
    assert_eq!(robots[1].name, "r1");

    let other = listings.list_robots(&ctx("t2")).await.unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].status, RolloutRobotStatus::Failed);

    assert!(listings.list_robots(&ctx("t3")).await.unwrap().is_empty());
}

#[tokio::test]
async fn robot_groups_resolve_within_team() {
    let listings = RobotListings::new(fleet());
    let groups = listings
        .list_robot_groups(&ctx("t2"), &robot_id("r1"))
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id, "g1");
    assert_eq!(groups[0].name, "t2-group");
    assert_eq!(groups[0].created_at, ts(3));

    let err = listings
        .list_robot_groups(&ctx("t2"), &robot_id("r2"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn robot_rollouts_are_paged_and_scoped() {
    let listings = RobotListings::new(fleet());
    let all = listings
        .list_robot_rollouts(&ctx("t1"), &robot_id("r2"), Page::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].rollout.id, "ro-2");
    assert_eq!(all[0].status, RolloutRobotStatus::Scheduled);
    assert_eq!(all[1].rollout.name, "campaign ro-1");

    let second = listings
        .list_robot_rollouts(
            &ctx("t1"),
            &robot_id("r2"),
            Page {
                skip: 1,
                take: Some(MAX_ROLLOUT_PAGE * 10),
            },
        )
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].rollout.id, "ro-1");

    let err = listings
        .list_robot_rollouts(&ctx("t2"), &robot_id("r2"), Page::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
