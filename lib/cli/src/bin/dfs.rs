use virtual_dfs_cli::cli::dfs_main;

fn main() {
    dfs_main();
}
