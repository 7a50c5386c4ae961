//! # favicon-stage
//!
//! Post-build favicon injection for generated static sites. Runs after the
//! site generator: builds a favicon bundle once, then rewrites every generated
//! page to reference it, without ever editing a live page in place.
//!
//! # Architecture: Staged Injection
//!
//! ```text
//! 1. Scan       public/          →  page dirs       (which directories have pages)
//! 2. Bundle     favicon.png      →  public/favicon/ (assets + metadata artifact)
//! 3. Stage      public/a/*.html  →  scratch/a/      (plain copies)
//! 4. Inject     scratch/a/       →  scratch/a/      (one injector call per directory)
//! 5. Merge      scratch/a/       →  public/a/       (only newer, changed pages)
//! ```
//!
//! Steps 3-5 repeat per directory. The injector only ever sees scratch
//! copies; the merge step is the single writer to the live tree and replaces
//! pages atomically.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Finds directories that directly contain page files |
//! | [`bundle`] | Runs the bundle generator once and validates its metadata artifact |
//! | [`workspace`] | Scratch mirror of the site tree, removed on drop |
//! | [`inject`] | Stages a directory's pages and runs the injector over them in one call |
//! | [`merge`] | Update-if-newer, content-checked atomic copy back to the live tree |
//! | [`pipeline`] | Sequences the steps, reports progress, applies the failure policy |
//! | [`tools`] | Generator/injector traits and the process-spawning implementation |
//! | [`config`] | `favicon.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## External Tools Behind Traits
//!
//! The generator and injector are black boxes configured as a program plus an
//! argument template. The pipeline only talks to [`tools::BundleGenerator`]
//! and [`tools::TagInjector`], so every step is tested with in-process mocks.
//!
//! ## Merge Rule
//!
//! A scratch page replaces its live counterpart only when it is strictly
//! newer *and* its bytes differ. Re-running over an already injected site
//! therefore writes nothing. The `content` merge policy drops the timestamp
//! test for trees whose mtimes are not trustworthy.
//!
//! ## Scoped Scratch Workspace
//!
//! The scratch root is an owned value ([`workspace::ScratchWorkspace`]), not a
//! process-global path. Drop removes it, so success, errors, and interrupts
//! all clean up through ordinary unwinding.

pub mod bundle;
pub mod config;
pub mod inject;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod scan;
pub mod tools;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;
