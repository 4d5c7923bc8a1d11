use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::{channel::mpsc::channel, TryFutureExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::cli::{ReplayArgs, ServeArgs};
use crate::event::{Delivery, EventKind};

mod listener;
mod runner;

pub(crate) use runner::{Pipeline, Settings, SummaryReviewer};

pub(crate) async fn serve(args: ServeArgs) -> Result<()> {
    let pipeline = Arc::new(args.gitlab.into_pipeline(false)?);
    tracing::info!(
        "Reviewing {} for {}",
        pipeline.filter.extensions().join(","),
        pipeline.gitlab.base_url()
    );

    let (sender, receiver) = channel::<Delivery>(32);
    let service = listener::listen(sender);
    let tcp_listener = TcpListener::bind(&args.addr).await?;
    tracing::info!("Listening on {}{}", args.addr, listener::WEBHOOK_PATH);

    let mut set: JoinSet<Result<()>> = JoinSet::new();
    set.spawn(axum::serve(tcp_listener, service).into_future().err_into());
    set.spawn(runner::runner(receiver, pipeline).map(Result::Ok));
    while let Some(res) = set.join_next().await {
        res??;
    }
    Ok(())
}

/// Run a stored webhook payload through the pipeline without posting anything.
pub(crate) async fn replay(args: ReplayArgs) -> Result<Option<String>> {
    let pipeline = args.gitlab.into_pipeline(true)?;
    let payload = read_payload(&args.payload).await?;
    let Some(kind) = EventKind::of(&payload) else {
        anyhow::bail!(
            "{} is neither a merge request nor a push event",
            args.payload.display()
        );
    };
    pipeline.handle(&Delivery { kind, payload }).await
}

async fn read_payload(path: &Path) -> Result<serde_json::Value> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}
