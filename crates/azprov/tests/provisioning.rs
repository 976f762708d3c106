//! End-to-end provisioning runs against an emulated Resource Manager.

mod common;

use azprov::{images, Error, RunPlan, RunState};
use azprov_core::client::PollPolicy;
use azprov_core::types::{ResourceKind, ResourceRef};
use common::{group_path, provisioner, provisioner_with, requests, resource_path, ArmEmulator};
use std::time::Duration;

fn plan() -> RunPlan {
    RunPlan::new("rg1", "westus", "acct1", "vm1", "azureuser", "S3cret!pass")
}

fn puts(log: &[(String, String)]) -> Vec<String> {
    log.iter()
        .filter(|(method, _)| method == "PUT")
        .map(|(_, path)| path.clone())
        .collect()
}

#[tokio::test]
async fn full_run_creates_vm_bound_to_its_interface() {
    let (server, emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let ready = provisioner.execute(&plan()).await.unwrap();
    let vm = ready.vm();

    let nic_path = resource_path("rg1", "Microsoft.Network", "networkInterfaces", "vm1-nic");
    assert_eq!(vm.name, "vm1");
    assert_eq!(vm.provisioning_state(), Some("Succeeded"));
    assert_eq!(vm.network_interface_ids().collect::<Vec<_>>(), vec![nic_path.as_str()]);
    assert_eq!(
        vm.os_disk_vhd_uri(),
        Some("https://acct1.blob.core.windows.net/vhds/vm1.vhd")
    );
    assert_eq!(vm.image_reference(), Some(images::lookup("linux").unwrap()));
    assert_eq!(emulator.resource_count(), 6);

    let vnet_path = resource_path("rg1", "Microsoft.Network", "virtualNetworks", "vm1-vnet");
    assert_eq!(
        puts(&requests(&server).await),
        vec![
            group_path("rg1"),
            resource_path("rg1", "Microsoft.Storage", "storageAccounts", "acct1"),
            vnet_path.clone(),
            format!("{vnet_path}/subnets/vm1-subnet"),
            nic_path,
            resource_path("rg1", "Microsoft.Compute", "virtualMachines", "vm1"),
        ]
    );

    provisioner.finish();
}

#[tokio::test]
async fn stage_chain_carries_identifiers_forward() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let group = provisioner.provision_group("rg1", "westus").await.unwrap();
    assert_eq!(group.group().provisioning_state(), Some("Succeeded"));

    let storage = provisioner.provision_storage(&group, "acct1").await.unwrap();
    assert_eq!(storage.account().provisioning_state(), Some("Succeeded"));

    let network = provisioner
        .provision_network(&storage, "net", "10.1.0.0/16")
        .await
        .unwrap();
    assert_eq!(network.vnet().address_prefixes(), ["10.1.0.0/16".to_string()]);

    let subnet = provisioner
        .provision_subnet(&network, "web", "10.1.2.0/24")
        .await
        .unwrap();
    assert_eq!(subnet.subnet().address_prefix(), Some("10.1.2.0/24"));
    assert!(subnet.subnet_id().as_str().ends_with("/virtualNetworks/net/subnets/web"));

    let nic = provisioner.provision_nic(&subnet, "web-nic", "ipconfig1").await.unwrap();
    assert_eq!(nic.nic().subnet_id(), Some(subnet.subnet_id()));

    let template = nic.vm_template(
        "web-01",
        "azureuser",
        "S3cret!pass",
        "web-01-os",
        images::lookup("windows").unwrap(),
    );
    assert_eq!(template.nic_id(), Some(nic.nic_id().as_str()));

    let submitted = provisioner.submit_vm(&nic, template).await.unwrap();
    assert!(submitted.is_pending());

    let ready = submitted.wait().await.unwrap();
    assert_eq!(ready.context().resource_group, "rg1");
    assert_eq!(
        ready.vm().os_disk_vhd_uri(),
        Some("https://acct1.blob.core.windows.net/vhds/web-01.vhd")
    );
    assert_eq!(
        ready.vm().image_reference().map(ToString::to_string).as_deref(),
        Some("MicrosoftWindowsServerEssentials:WindowsServerEssentials:WindowsServerEssentials:latest")
    );

    let fetched = provisioner.get_virtual_machine("rg1", "web-01").await.unwrap();
    assert_eq!(fetched.id, ready.vm().id);
}

#[tokio::test]
async fn repeating_a_run_is_idempotent() {
    let (server, emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let first = provisioner.execute(&plan()).await.unwrap().into_vm();
    let paths = emulator.paths();

    let second = provisioner.execute(&plan()).await.unwrap().into_vm();
    assert_eq!(first.id, second.id);
    assert_eq!(first.os_disk_vhd_uri(), second.os_disk_vhd_uri());
    assert_eq!(emulator.paths(), paths);

    let group = provisioner.get_resource_group("rg1").await.unwrap();
    assert_eq!(group.location, "westus");
}

#[tokio::test]
async fn creates_block_until_the_resource_is_ready() {
    let (server, emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    provisioner.create_resource_group("rg1", "westus").await.unwrap();
    let account = provisioner
        .create_storage_account("rg1", "acct1", "westus")
        .await
        .unwrap();

    let path = resource_path("rg1", "Microsoft.Storage", "storageAccounts", "acct1");
    assert!(emulator.is_settled(&path));
    assert_eq!(account.provisioning_state(), Some("Succeeded"));
    assert_eq!(account.sku.as_ref().map(|sku| sku.name.as_str()), Some("Standard_LRS"));

    let vnet = provisioner
        .create_virtual_network("rg1", "net", "westus", "10.0.0.0/16")
        .await
        .unwrap();
    assert_eq!(vnet.provisioning_state(), Some("Succeeded"));
}

#[tokio::test]
async fn unknown_os_fails_before_any_request() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let failure = provisioner
        .execute(&plan().with_os("plan9"))
        .await
        .unwrap_err();

    assert_eq!(failure.reached, RunState::NotStarted);
    assert!(failure.error.is_not_found());
    assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn empty_plan_fields_are_rejected_before_any_request() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let mut plan = plan();
    plan.subnet_name.clear();
    let failure = provisioner.execute(&plan).await.unwrap_err();

    assert_eq!(failure.reached, RunState::NotStarted);
    assert!(matches!(failure.error, Error::ValidationError(_)));
    assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn subnet_outside_address_space_halts_the_run() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let failure = provisioner
        .execute(&plan().with_cidrs("10.0.0.0/16", "192.168.0.0/24"))
        .await
        .unwrap_err();

    assert_eq!(failure.reached, RunState::NetworkReady);
    assert_eq!(failure.failed_step(), Some(RunState::SubnetReady));
    assert_eq!(
        failure.error.resource(),
        Some(&ResourceRef::subnet("rg1", "vm1-vnet", "vm1-subnet"))
    );
    assert!(matches!(
        failure.error.root_cause(),
        Error::Provider { code, .. } if code == "NetcfgInvalidSubnet"
    ));

    let log = requests(&server).await;
    assert!(puts(&log).iter().all(|p| !p.contains("networkInterfaces")));
    assert!(puts(&log).iter().all(|p| !p.contains("virtualMachines")));
}

#[tokio::test]
async fn interface_is_not_submitted_without_its_subnet() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    provisioner.create_resource_group("rg1", "westus").await.unwrap();
    provisioner
        .create_virtual_network("rg1", "net", "westus", "10.0.0.0/16")
        .await
        .unwrap();

    let err = provisioner
        .create_network_interface("rg1", "westus", "net", "missing", "nic1", "ipconfig1")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.resource(), Some(&ResourceRef::subnet("rg1", "net", "missing")));
    assert!(puts(&requests(&server).await)
        .iter()
        .all(|p| !p.contains("networkInterfaces")));
}

#[tokio::test]
async fn subnet_names_are_not_split_into_queries() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    provisioner.create_resource_group("rg1", "westus").await.unwrap();
    provisioner
        .create_virtual_network("rg1", "net", "westus", "10.0.0.0/16")
        .await
        .unwrap();
    provisioner
        .create_subnet("rg1", "net", "web", "10.0.0.0/24")
        .await
        .unwrap();

    let err = provisioner
        .create_network_interface("rg1", "westus", "net", "web?x=1", "nic1", "ipconfig1")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.resource(), Some(&ResourceRef::subnet("rg1", "net", "web?x=1")));
    assert!(puts(&requests(&server).await)
        .iter()
        .all(|p| !p.contains("networkInterfaces")));
}

#[tokio::test]
async fn stage_chain_rechecks_a_removed_subnet() {
    let (server, emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let group = provisioner.provision_group("rg1", "westus").await.unwrap();
    let storage = provisioner.provision_storage(&group, "acct1").await.unwrap();
    let network = provisioner
        .provision_network(&storage, "net", "10.0.0.0/16")
        .await
        .unwrap();
    let subnet = provisioner
        .provision_subnet(&network, "web", "10.0.1.0/24")
        .await
        .unwrap();

    emulator.remove(subnet.subnet_id().as_str());

    let err = provisioner
        .provision_nic(&subnet, "web-nic", "ipconfig1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.resource().map(|r| r.kind), Some(ResourceKind::Subnet));
}

#[tokio::test]
async fn resource_group_location_cannot_change() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    provisioner.create_resource_group("rg1", "westus").await.unwrap();
    let err = provisioner
        .create_resource_group("rg1", "eastus")
        .await
        .unwrap_err();

    assert!(matches!(
        err.root_cause(),
        Error::Provider { code, .. } if code == "InvalidResourceGroupLocation"
    ));
    assert_eq!(err.resource(), Some(&ResourceRef::resource_group("rg1")));
}

#[tokio::test]
async fn storage_requires_its_resource_group() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    let err = provisioner
        .create_storage_account("nowhere", "acct1", "westus")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        err.resource(),
        Some(&ResourceRef::storage_account("nowhere", "acct1"))
    );
}

#[tokio::test]
async fn lookups_of_missing_resources_are_not_found() {
    let (server, _emulator) = ArmEmulator::start().await;
    let provisioner = provisioner(&server);

    assert!(provisioner.get_resource_group("rg1").await.unwrap_err().is_not_found());
    provisioner.create_resource_group("rg1", "westus").await.unwrap();

    assert!(provisioner
        .get_storage_account("rg1", "acct1")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(provisioner
        .get_virtual_network("rg1", "net")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(provisioner
        .get_subnet("rg1", "net", "web")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(provisioner
        .get_network_interface("rg1", "nic1")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(provisioner
        .get_virtual_machine("rg1", "vm1")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn vm_timeout_halts_after_submission_and_can_resume() {
    let (server, emulator) = ArmEmulator::start().await;
    emulator.stick("virtualMachines");
    let impatient = provisioner_with(
        &server,
        PollPolicy::new()
            .with_interval(Duration::from_millis(10))
            .with_max_wait(Duration::from_millis(200)),
    );

    let failure = impatient.execute(&plan()).await.unwrap_err();
    assert_eq!(failure.reached, RunState::VmSubmitted);
    assert!(matches!(failure.error.root_cause(), Error::Timeout(_)));
    assert_eq!(
        failure.error.resource(),
        Some(&ResourceRef::virtual_machine("rg1", "vm1"))
    );
    assert_eq!(emulator.resource_count(), 6);

    emulator.unstick("virtualMachines");
    let ready = provisioner(&server).execute(&plan()).await.unwrap();
    assert_eq!(ready.vm().provisioning_state(), Some("Succeeded"));
    assert_eq!(emulator.resource_count(), 6);
}
