// Copyright 2026 Corpus Probe Authors
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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;

use crate::config::Backend;

#[derive(Parser, Debug)]
#[command(
    name = "probe",
    version,
    about = "Scan local files into a table and run scored substring searches"
)]
pub struct Cli {
    /// Table store backend (overrides the config file)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a directory and list the files that would be loaded
    Scan(ScanArgs),

    /// Scan a directory and replace the table with its files
    Upload(ScanArgs),

    /// Run a scored search against the loaded table
    Search(SearchArgs),

    /// Scan, upload, and run the demo searches
    Test(TestArgs),

    /// Show row counts for the loaded table
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (defaults to the current directory)
    pub dir: Option<PathBuf>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Maximum number of rows
    #[arg(long)]
    pub k: Option<usize>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Directory to scan (defaults to the current directory)
    pub dir: Option<PathBuf>,

    /// Maximum number of rows per search
    #[arg(long)]
    pub k: Option<usize>,

    /// Search text; repeat to run several (defaults to the configured demo queries)
    #[arg(long = "query")]
    pub queries: Vec<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
