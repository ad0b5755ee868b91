// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use astra::cli::{self, help, CliArgs};
use astra::infrastructure::constants::ENV_LOG_LEVEL;
use astra::shared::logging::init_logging;
use clap::FromArgMatches;
use colored::Colorize;

#[tokio::main]
async fn main() {
    let matches = help::build_command().get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };

    init_logging(
        std::env::var(ENV_LOG_LEVEL).ok().as_deref(),
        args.globals.verbosity,
    );

    let json = args.globals.is_json();
    if let Err(err) = cli::run(args).await {
        tracing::debug!("command failed: {:?}", err);
        let message = format!("{:#}", err);
        if json {
            println!("{}", serde_json::json!({ "message": message }));
        } else {
            eprintln!("{} {}", "✗".red(), message);
        }
        std::process::exit(1);
    }
}
