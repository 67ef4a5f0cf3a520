use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "plotgpt", about = "Natural-language 3D plot generation service", version)]
pub struct Cli {
    /// Address to bind the HTTP server on.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP server on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Generative model to use.
    #[arg(long)]
    pub model: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
