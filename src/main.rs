use anyhow::{Context, Result};

use order_insight::utils::logging;
use order_insight::{App, Config};

/// 不带参数时启动 HTTP 服务；带参数时把参数当作问题执行一次并输出 JSON
#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    if query.trim().is_empty() {
        app.run().await?;
    } else {
        let envelope = app.run_once(&query).await;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }

    Ok(())
}
