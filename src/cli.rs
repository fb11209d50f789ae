use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-inspect")]
#[command(about = "写真帳の外観写真をAI判定し、コメント欄へ所見を書き込むツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真帳ブックを点検してコメント欄に所見を書き込む
    Inspect {
        /// ブック（.xlsx/.xlsm）またはブックのあるフォルダ
        #[arg(required = true)]
        path: PathBuf,

        /// 対象シート名（デフォルト: 設定値、未設定なら「写真帳」）
        #[arg(short, long)]
        sheet: Option<String>,

        /// 出力ファイル/ディレクトリ（デフォルト: 入力と同じ場所に <名前>_点検済.xlsx）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 推論サービスのURL（指定時はGeminiを直接呼ばない）
        #[arg(long)]
        service_url: Option<String>,

        /// 判定指示文
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// 推論サービスを起動
    Serve {
        /// 待ち受けアドレス
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// レスポンスにGeminiの生レスポンスを含める
        #[arg(long)]
        echo_raw: bool,
    },

    /// 設定を管理
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// モデル名を設定
        #[arg(long)]
        model: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect() {
        let cli = Cli::parse_from([
            "photo-inspect", "inspect", "写真帳.xlsx", "--sheet", "Sheet1", "--service-url", "http://localhost:8080",
        ]);
        match cli.command {
            Commands::Inspect { path, sheet, output, service_url, prompt } => {
                assert_eq!(path, PathBuf::from("写真帳.xlsx"));
                assert_eq!(sheet.as_deref(), Some("Sheet1"));
                assert!(output.is_none());
                assert_eq!(service_url.as_deref(), Some("http://localhost:8080"));
                assert!(prompt.is_none());
            }
            _ => panic!("inspect として解釈されるべき"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::parse_from(["photo-inspect", "serve", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve { bind, echo_raw } => {
                assert_eq!(bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
                assert!(!echo_raw);
            }
            _ => panic!("serve として解釈されるべき"),
        }
    }
}
