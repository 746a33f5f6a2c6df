//! `livewire tail`: follow the stream until interrupted.

use futures_util::StreamExt;
use tokio::sync::mpsc;

use livewire_core::{ChangeEvent, ChangeFilter, EventStreamClient, MessageEvent};

use crate::cli::{GlobalOpts, TailArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

enum Line {
    Change(ChangeEvent),
    Message(MessageEvent),
}

/// Build the change filter the `--kind`/`--action`/`--id` flags describe.
pub(crate) fn change_filter(args: &TailArgs) -> ChangeFilter {
    match (args.kind.as_slice(), args.action.as_deref(), args.id.as_deref()) {
        ([], None, None) => ChangeFilter::All,
        ([kind], None, None) => ChangeFilter::Kind(kind.clone()),
        ([], Some(action), None) => ChangeFilter::Action(action.to_owned()),
        ([kind], None, Some(id)) => ChangeFilter::KindAndId {
            kind: kind.clone(),
            id: id.to_owned(),
        },
        (kinds, action, id) => {
            let kinds = kinds.to_vec();
            let action = action.map(str::to_owned);
            let id = id.map(str::to_owned);
            ChangeFilter::Custom(Box::new(move |event| {
                (kinds.is_empty() || kinds.contains(&event.kind))
                    && action.as_ref().is_none_or(|a| *a == event.action)
                    && id.as_ref().is_none_or(|i| *i == event.id)
            }))
        }
    }
}

pub async fn handle(
    client: &EventStreamClient,
    args: &TailArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let renderer = Renderer::new(global.output, output::should_color(global.color));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let change_tx = tx.clone();
    client.register_filtered_change_listener(change_filter(args), move |event| {
        let _ = change_tx.send(Line::Change(event.clone()));
    });
    if args.messages {
        client.register_message_listener(move |event| {
            let _ = tx.send(Line::Message(event.clone()));
        });
    } else {
        drop(tx);
    }

    let mut states = client.state_stream();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    client.start();
    let mut printed: u64 = 0;
    let result = loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                break Ok(());
            }
            Some(state) = states.next(), if args.state => {
                if !global.quiet {
                    eprintln!("{}", output::describe_state(&state));
                }
            }
            line = rx.recv() => {
                let Some(line) = line else { break Ok(()) };
                let rendered = match line {
                    Line::Change(event) => renderer.change(&event),
                    Line::Message(event) => renderer.message(&event),
                };
                match rendered {
                    Ok(rendered) => output::print_output(&rendered, global.quiet),
                    Err(e) => break Err(e),
                }
                printed += 1;
                if args.count.is_some_and(|limit| printed >= limit) {
                    break Ok(());
                }
            }
        }
    };

    client.stop();
    result
}
