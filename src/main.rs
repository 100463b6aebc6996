fn main() -> Result<(), Box<dyn std::error::Error>> {
    parlor::cli::main()
}
