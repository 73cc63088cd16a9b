use anyhow::Context;
use school_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load school settings")?;
    school_telemetry::init(&settings.telemetry)?;

    school_app::serve(&settings).await
}
