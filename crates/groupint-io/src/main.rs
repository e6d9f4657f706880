use clap::Parser;
use groupint_io::cli::{run_fill_gaps_command, run_gm_command, run_solve_command, Cli, Commands};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve(args) => run_solve_command(&args)?,
        Commands::Gm { input, tree } => {
            run_gm_command(&input, &tree)?;
        }
        Commands::FillGaps { interventions_dir } => run_fill_gaps_command(&interventions_dir)?,
    }

    Ok(())
}
