use std::sync::Arc;

use delta_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    delta_stream::init_observability();
    let config = ClientConfig::from_env()?;
    let manager = StreamManager::new(Arc::new(ReqwestTransport::new(&config)?));

    let request = config
        .request()
        .body(ChatPayload::new(vec![ChatMessage::user("Stream a greeting.")]))
        .build()?;
    let sink = Callbacks::new()
        .with_thought(|text| eprint!("{text}"))
        .with_chunk(|token, _full| print!("{token}"))
        .with_complete(|_| println!())
        .with_error(|err| eprintln!("stream error: {err}"));

    match manager.start(request, sink)?.finish().await? {
        StreamOutcome::Completed { text, .. } => eprintln!("({} chars)", text.chars().count()),
        StreamOutcome::Failed(_) | StreamOutcome::Aborted => {}
    }
    Ok(())
}
