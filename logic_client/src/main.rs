use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

const SERVER_URL_VAR: &str = "LOGIC_SERVER_URL";
const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:25917/ws";

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::var(SERVER_URL_VAR).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let url = Url::parse(&url)?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 服务器发来的都是给人看的文本，原样打印
    let mut reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    println!("\n{}", text.as_str());
                    let _ = prompt();
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
        println!("\n服务器关闭了连接");
    });

    // 主任务把用户输入逐行发给服务器
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    println!("--- Logic 客户端 --- 输入 help 查看可用命令，exit 退出");

    loop {
        prompt()?;
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "exit" {
                    println!("正在断开连接...");
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if write.send(Message::Text(line.to_string().into())).await.is_err() {
                    break;
                }
            }
            _ = &mut reader => break,
        }
    }

    let _ = write.close().await;
    Ok(())
}
