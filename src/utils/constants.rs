pub const MAINNET_CHAIN_ID: u64 = 101;

pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

pub const BALANSOL_PROGRAM_ID: &str = "D3BBjqUdCYuP18fNvvMbPAZ8DpcRi4io2EsYHQawJDag";

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[non_exhaustive]
pub struct Endpoints;

impl Endpoints {
    pub const RPC_HTTP: &'static str = "https://api.mainnet-beta.solana.com";
    pub const RPC_WS: &'static str = "wss://api.mainnet-beta.solana.com";
    pub const STAT_HOST: &'static str = "https://stat.sentre.io";
    pub const STAT_RPC: &'static str = "https://stat.sentre.io";
    pub const TOKEN_LIST: &'static str = "https://token.jup.ag/all";
    pub const QUOTE_API: &'static str = "https://quote-api.jup.ag/v6";
}
