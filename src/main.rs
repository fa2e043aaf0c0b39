fn main() -> Result<(), Box<dyn std::error::Error>> {
    toolrelay::cli::main()
}
