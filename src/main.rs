use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
mod auth;
use fieldguard::{
    DerivationParams, FieldBinder, FormPayload, KeySource, ResourceLimits, SecretHash, crypto,
};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// 64 MiB, 2 passes
    Interactive,
    /// 256 MiB, 3 passes
    Moderate,
    /// 1 GiB, 4 passes
    Sensitive,
}

impl Profile {
    fn params(self) -> DerivationParams {
        match self {
            Profile::Interactive => DerivationParams::interactive(),
            Profile::Moderate => DerivationParams::moderate(),
            Profile::Sensitive => DerivationParams::sensitive(),
        }
    }
}

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Cost profile; the flags below override single values of it
    #[arg(long, value_enum, default_value_t = Profile::Interactive, env = "FIELDGUARD_PROFILE")]
    profile: Profile,

    /// Argon2 memory cost in KiB
    #[arg(long = "argon-mem", env = "FIELDGUARD_ARGON_MEM")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations
    #[arg(long = "argon-time", env = "FIELDGUARD_ARGON_TIME")]
    time_cost: Option<u32>,

    /// Argon2 parallelism
    #[arg(long = "argon-parallelism", env = "FIELDGUARD_ARGON_PARALLELISM")]
    parallelism: Option<u32>,

    /// Accept costs below the interactive profile when sealing or hashing
    #[arg(long, env = "FIELDGUARD_ALLOW_WEAK_PARAMS")]
    allow_weak_params: bool,
}

impl Argon2Args {
    fn to_params(&self) -> Result<DerivationParams> {
        let base = self.profile.params();

        Ok(DerivationParams::new(
            self.mem_cost_kib.unwrap_or(base.mem_cost_kib()),
            self.time_cost.unwrap_or(base.time_cost()),
            self.parallelism.unwrap_or(base.parallelism()),
        )?)
    }

    /// Resolves params for new secrets, refusing costs under the interactive profile.
    fn to_policy_params(&self) -> Result<DerivationParams> {
        let params = self.to_params()?;
        let floor = DerivationParams::interactive();
        if !self.allow_weak_params && !params.is_at_least(&floor) {
            bail!(
                "argon2 costs below the interactive profile (m={} KiB, t={}, p={}); \
                 pass --allow-weak-params to use them anyway",
                floor.mem_cost_kib(),
                floor.time_cost(),
                floor.parallelism()
            );
        }
        Ok(params)
    }
}

#[derive(Debug, clap::Args)]
struct PayloadArgs {
    /// Comma-separated names of the sensitive fields
    #[arg(long, short, value_delimiter = ',', required = true)]
    fields: Vec<String>,

    /// JSON payload file (defaults to stdin)
    #[arg(long, short, value_name = "PATH")]
    input: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(name = "fieldguard")]
#[command(
    version,
    about = "Encrypts sensitive form fields and verifies PINs without storing them."
)]
struct Cli {
    /// Upper bound on Argon2 memory cost, in KiB, accepted from any source
    #[arg(long, global = true, value_name = "KIB", env = "FIELDGUARD_MAX_MEM_KIB")]
    max_mem_kib: Option<u32>,

    /// Upper bound on Argon2 passes accepted from any source
    #[arg(long, global = true, value_name = "PASSES", env = "FIELDGUARD_MAX_TIME_COST")]
    max_time_cost: Option<u32>,

    /// Upper bound on Argon2 lanes accepted from any source
    #[arg(long, global = true, value_name = "LANES", env = "FIELDGUARD_MAX_PARALLELISM")]
    max_parallelism: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts the sensitive fields of a JSON form payload
    Seal {
        #[command(flatten)]
        payload: PayloadArgs,

        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Decrypts the sensitive fields of a sealed JSON form payload
    Open {
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Hashes a PIN or password for later verification
    Hash {
        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Checks a PIN or password against a stored hash
    #[command(arg_required_else_help = true)]
    Verify {
        /// Stored hash in PHC format
        #[arg(long)]
        hash: String,

        /// Policy the stored hash is compared against for rehash hints
        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Prints the derivation parameters the cost flags resolve to
    Params {
        #[command(flatten)]
        argon2: Argon2Args,
    },
}

fn read_payload(input: Option<&PathBuf>) -> Result<FormPayload> {
    let mut raw = Zeroizing::new(String::new());
    match input {
        Some(path) => {
            *raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
        None => {
            io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read payload from stdin")?;
        }
    }
    serde_json::from_str(&raw).context("payload must be a JSON object of string fields")
}

impl Cli {
    fn limits(&self) -> ResourceLimits {
        let mut limits = self
            .max_mem_kib
            .map(ResourceLimits::new)
            .unwrap_or_default();
        if let Some(t) = self.max_time_cost {
            limits = limits.with_max_time_cost(t);
        }
        if let Some(p) = self.max_parallelism {
            limits = limits.with_max_parallelism(p);
        }
        limits
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Cli::parse();
    let limits = args.limits();

    match args.command {
        Commands::Seal { payload, argon2 } => {
            let params = argon2.to_policy_params()?;
            let form = read_payload(payload.input.as_ref())?;
            let passphrase = auth::read_passphrase()?;

            let binder = FieldBinder::new(
                payload.fields,
                KeySource::passphrase(passphrase.as_bytes(), params),
            )
            .with_limits(limits);
            drop(passphrase);

            let sealed = binder.seal(&form).context("failed to seal payload")?;
            println!("{}", serde_json::to_string_pretty(&sealed)?);
        }
        Commands::Open { payload } => {
            let form = read_payload(payload.input.as_ref())?;
            let passphrase = auth::read_passphrase()?;

            // The envelopes carry their own params; these are unused on open.
            let binder = FieldBinder::new(
                payload.fields,
                KeySource::passphrase(passphrase.as_bytes(), DerivationParams::default()),
            )
            .with_limits(limits);
            drop(passphrase);

            let opened = binder.open(&form).context("failed to open payload")?;
            let json = Zeroizing::new(serde_json::to_string_pretty(&opened)?);
            println!("{}", *json);
        }
        Commands::Hash { argon2 } => {
            let params = argon2.to_policy_params()?;
            limits.check(&params)?;
            let secret = auth::read_new_secret_with_confirmation()?;

            let stored = crypto::hash(secret.as_bytes(), &params)?;
            println!("{stored}");
        }
        Commands::Verify { hash, argon2 } => {
            let stored = SecretHash::parse(&hash)?;
            let candidate = auth::read_secret()?;

            if crypto::verify_within(&stored, candidate.as_bytes(), &limits)? {
                if crypto::needs_rehash(&stored, &argon2.to_params()?)? {
                    eprintln!("note: stored hash uses outdated cost parameters; rehash it");
                }
                println!("match");
            } else {
                println!("mismatch");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Params { argon2 } => {
            let params = argon2.to_params()?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
