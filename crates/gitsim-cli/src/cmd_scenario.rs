use crate::render;
use anyhow::{ensure, Result};
use gitsim_conductor::{InstantDelay, Notifier, Simulator, TracingNotifier};
use gitsim_core::SyncCounts;
use std::sync::Arc;

/// Execute `gitsim scenario [--json]`
pub fn execute(config: gitsim_core::SimConfig, json: bool) -> Result<()> {
    let notifier: Arc<dyn Notifier> = if json {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(render::ConsoleNotifier)
    };
    let sim = Simulator::builder(config)
        .with_delay(Arc::new(InstantDelay::new()))
        .with_notifier(notifier)
        .build()?;

    let rt = crate::runtime()?;
    rt.block_on(walkthrough(&sim, !json))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sim.snapshot())?);
    }
    Ok(())
}

/// Two local commits, push, a teammate push, pull, deploy, roll back.
pub async fn walkthrough(sim: &Simulator, verbose: bool) -> Result<()> {
    let say = |step: &str, counts: SyncCounts| {
        if verbose {
            println!("{step:<28} {}", render::counts(&counts));
        }
    };

    say("seeded", sim.counts());
    sim.commit_local(Some("Add health endpoint"), None)?;
    sim.commit_local(Some("Tune readiness probe"), None)?;
    say("two local commits", sim.counts());
    sim.push()?;
    say("push", sim.counts());
    sim.simulate_remote_push(Some("Fix typo in README"), None)?;
    say("teammate pushes", sim.counts());
    sim.pull()?;
    let counts = sim.counts();
    say("pull", counts);
    ensure!(
        counts.ahead == 0 && counts.behind == 0 && counts.synced == counts.total,
        "ledger did not converge: {}",
        render::counts(&counts)
    );

    let deployed = sim.run_feature_deployment().await?;
    if verbose {
        println!("{}", render::report(&deployed));
    }
    let rolled_back = sim.run_rollback().await?;
    if verbose {
        println!("{}", render::report(&rolled_back));
        print!("{}", render::history(&sim.history()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsim_conductor::{OrchestratorStatus, Simulator};
    use gitsim_core::{DeploymentStatus, SimConfig};

    #[tokio::test]
    async fn walkthrough_ends_back_at_baseline() {
        let sim = Simulator::builder(SimConfig::default())
            .with_delay(Arc::new(InstantDelay::new()))
            .build()
            .unwrap();
        walkthrough(&sim, false).await.unwrap();

        let snap = sim.snapshot();
        assert_eq!(snap.counts.total, 8);
        assert_eq!(snap.counts.synced, 8);
        assert_eq!(snap.cluster.current_version, "v1.0.0");
        assert_eq!(snap.orchestrator, OrchestratorStatus::Idle);
        let statuses: Vec<DeploymentStatus> = snap.history.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![DeploymentStatus::Rollback, DeploymentStatus::Success]
        );
    }
}
